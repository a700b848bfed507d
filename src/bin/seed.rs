//! Development seeder.
//!
//! `cargo run --bin seed [-- --force]`
//!
//! Wipes the database and fills it with labels, accounts (with generated
//! avatars), articles and comments. Refuses to run in production, and refuses
//! to run twice unless `--force` is given. Generated credentials are written to
//! `seeded-users.txt`.
//!
//! The wipe only clears database tables. With `BLOB_BACKEND=s3` the objects of
//! earlier runs stay in the bucket. The configured superadmin is recreated
//! after the wipe.

use gazette::{
    auth::{ensure_superadmin, hash_password},
    config::{AppConfig, BlobBackend, Env},
    models::{
        ArticleBody, ArticleKind, LabelRequest, NewFile, NewUser, PermissionLevel,
        UpdateArticleRequest,
    },
    repository::{PostgresRepository, Repository, RepositoryState},
    storage::{BlobState, PostgresBlobStore, S3BlobStore},
};
use rand::{Rng, SeedableRng, distributions::Alphanumeric, rngs::StdRng, seq::SliceRandom};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{fmt::Write as _, path::Path, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const LOCK_FILE: &str = ".seeded-db";
const CREDENTIALS_FILE: &str = "seeded-users.txt";

const READERS: usize = 10;
const WRITERS: usize = 4;
const ADMINS: usize = 1;
const OPEN_ARTICLES: usize = 60;
const CLOSED_ARTICLES: usize = 20;

const LABELS: [(&str, &str, &str); 9] = [
    ("Politics", "#b71c1c", "#ffffff"),
    ("Economy", "#1b5e20", "#ffffff"),
    ("Technology", "#0d47a1", "#ffffff"),
    ("Science", "#4a148c", "#ffffff"),
    ("Culture", "#f9a825", "#000000"),
    ("Sports", "#e65100", "#ffffff"),
    ("Health", "#00695c", "#ffffff"),
    ("World", "#37474f", "#ffffff"),
    ("Opinion", "#eceff1", "#263238"),
];

const FIRST_NAMES: [&str; 12] = [
    "Ada", "Ben", "Chloe", "Dario", "Eva", "Farid", "Greta", "Hugo", "Ines", "Jonas", "Kira",
    "Luca",
];
const LAST_NAMES: [&str; 10] = [
    "Novak", "Berg", "Moreau", "Rossi", "Keller", "Silva", "Horvat", "Lind", "Costa", "Weber",
];

const WORDS: [&str; 40] = [
    "market", "city", "council", "report", "season", "research", "policy", "energy", "river",
    "school", "museum", "election", "budget", "team", "climate", "harbour", "festival", "study",
    "vote", "gallery", "network", "project", "hospital", "court", "bridge", "summit", "league",
    "archive", "garden", "railway", "startup", "satellite", "vaccine", "orchestra", "tariff",
    "drought", "reform", "stadium", "library", "parliament",
];

const COMMENTS: [&str; 8] = [
    "Great read, thanks!",
    "I disagree with the second point.",
    "Looking forward to the follow-up.",
    "Could you share the sources?",
    "This explains a lot.",
    "Interesting perspective.",
    "Finally someone writes about this.",
    "The numbers in the chart look off to me.",
];

struct SeededUser {
    email: String,
    password: String,
    level: PermissionLevel,
}

type SeedResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> SeedResult<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed=info,gazette=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.env == Env::Production {
        return Err("refusing to seed a production database".into());
    }

    let force = std::env::args().any(|arg| arg == "--force");
    if Path::new(LOCK_FILE).exists() && !force {
        return Err(
            format!("{LOCK_FILE} exists: the database was already seeded (use --force)").into(),
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = PostgresRepository::new(pool.clone());
    let blobs: BlobState = match &config.blob_backend {
        BlobBackend::Database => Arc::new(PostgresBlobStore::new(pool.clone())),
        BlobBackend::S3(s3) => Arc::new(S3BlobStore::new(s3)),
    };
    blobs.prepare().await?;

    let mut rng = StdRng::from_entropy();

    wipe(&pool).await?;

    let repo_state: RepositoryState = Arc::new(repo.clone());
    if let Some(admin) = &config.superadmin {
        ensure_superadmin(&repo_state, admin).await?;
    }

    // --- Labels ---
    let mut label_ids = Vec::with_capacity(LABELS.len());
    for (name, background, text) in LABELS {
        let label = repo
            .create_label(LabelRequest {
                name: name.to_string(),
                background_color: background.to_string(),
                text_color: text.to_string(),
            })
            .await?;
        label_ids.push(label.id);
    }
    tracing::info!(count = label_ids.len(), "seeded labels");

    // --- Users ---
    let mut seeded = Vec::new();
    let tiers = [
        (PermissionLevel::User, READERS, "reader"),
        (PermissionLevel::Writer, WRITERS, "writer"),
        (PermissionLevel::Admin, ADMINS, "admin"),
    ];
    for (level, count, prefix) in tiers {
        for n in 1..=count {
            let email = format!("{prefix}{n}@gazette.test");
            let user = seed_user(&repo, &blobs, &mut rng, level, &email).await?;
            seeded.push(user);
        }
    }
    tracing::info!(count = seeded.len(), "seeded users");

    let writers: Vec<&str> = seeded
        .iter()
        .filter(|user| user.level >= PermissionLevel::Writer)
        .map(|user| user.email.as_str())
        .collect();
    let everyone: Vec<&str> = seeded.iter().map(|user| user.email.as_str()).collect();

    // --- Articles and comments ---
    let kinds = std::iter::repeat_n(ArticleKind::Open, OPEN_ARTICLES)
        .chain(std::iter::repeat_n(ArticleKind::Closed, CLOSED_ARTICLES));
    let mut comment_count = 0;
    for kind in kinds {
        let author = writers.choose(&mut rng).copied().ok_or("no writers seeded")?;
        let id = repo.create_article(author, kind).await?;

        let label_count = rng.gen_range(0..=3);
        let labels = label_ids
            .choose_multiple(&mut rng, label_count)
            .copied()
            .collect();
        repo.update_article(
            id,
            &UpdateArticleRequest {
                title: Some(title(&mut rng)),
                labels: Some(labels),
                visible: Some(rng.gen_bool(0.8)),
                main_image: None,
            },
        )
        .await?;

        let sections = match kind {
            ArticleKind::Open => vec![ArticleBody::section_for(kind, false)],
            ArticleKind::Closed => vec![
                ArticleBody::section_for(kind, false),
                ArticleBody::section_for(kind, true),
            ],
        };
        for section in sections {
            repo.set_article_content(id, section, &markdown(&mut rng)).await?;
        }

        sqlx::query(
            "UPDATE articles \
             SET created_at = NOW() - make_interval(hours => $2), views = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(rng.gen_range(0..24 * 30))
        .bind(rng.gen_range(0i64..2000))
        .execute(&pool)
        .await?;

        for _ in 0..rng.gen_range(0..=3) {
            let commenter = everyone.choose(&mut rng).copied().ok_or("no users seeded")?;
            let text = COMMENTS.choose(&mut rng).copied().unwrap_or("Nice.");
            repo.add_comment(id, commenter, text).await?;
            comment_count += 1;
        }
    }
    tracing::info!(
        articles = OPEN_ARTICLES + CLOSED_ARTICLES,
        comments = comment_count,
        "seeded articles"
    );

    // --- Credentials and lock ---
    let mut credentials = String::from("# email password permissionLevel\n");
    for user in &seeded {
        writeln!(credentials, "{} {} {}", user.email, user.password, u8::from(user.level))?;
    }
    tokio::fs::write(CREDENTIALS_FILE, credentials).await?;
    tokio::fs::write(LOCK_FILE, chrono::Utc::now().to_rfc3339()).await?;

    tracing::info!("Seeding finished. Credentials written to {CREDENTIALS_FILE}.");
    Ok(())
}

/// Truncates every table. Blobs held in S3 are not touched.
async fn wipe(pool: &PgPool) -> SeedResult<()> {
    sqlx::query(
        "TRUNCATE comments, article_labels, articles, labels, file_blobs, files, users CASCADE",
    )
    .execute(pool)
    .await?;
    tracing::info!("wiped existing data");
    Ok(())
}

async fn seed_user(
    repo: &PostgresRepository,
    blobs: &BlobState,
    rng: &mut StdRng,
    level: PermissionLevel,
    email: &str,
) -> SeedResult<SeededUser> {
    let password: String = (&mut *rng).sample_iter(Alphanumeric).take(12).map(char::from).collect();
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Novak");

    repo.create_user(NewUser {
        id: email.to_string(),
        password_hash: hash_password(password.clone()).await?,
        name: format!("{first} {last}"),
        permission_level: level,
    })
    .await?;

    let svg = avatar_svg(rng, first, last);
    let file = repo
        .create_file(NewFile {
            id: Uuid::new_v4(),
            name: "avatar".to_string(),
            mime_type: "image/svg+xml".to_string(),
            owner: email.to_string(),
            size: svg.len() as i64,
        })
        .await?;
    blobs.put(file.id, &file.mime_type, svg.into_bytes()).await?;
    repo.set_avatar(email, Some(file.id)).await?;

    Ok(SeededUser {
        email: email.to_string(),
        password,
        level,
    })
}

fn avatar_svg(rng: &mut StdRng, first: &str, last: &str) -> String {
    let hue = rng.gen_range(0..360);
    let initials: String = [first, last].iter().filter_map(|part| part.chars().next()).collect();
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="128" height="128" "#,
            r#"viewBox="0 0 128 128"><rect width="128" height="128" "#,
            r#"fill="hsl({hue}, 55%, 45%)"/><text x="64" y="78" font-family="sans-serif" "#,
            r##"font-size="48" text-anchor="middle" fill="#ffffff">{initials}</text></svg>"##,
        ),
        hue = hue,
        initials = initials,
    )
}

fn sentence(rng: &mut StdRng, words: usize) -> String {
    let text: Vec<&str> = (0..words).filter_map(|_| WORDS.choose(rng).copied()).collect();
    let joined = text.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(c) => format!("{}{}", c.to_uppercase(), chars.as_str()),
        None => joined,
    }
}

fn title(rng: &mut StdRng) -> String {
    let words = rng.gen_range(3..8);
    sentence(rng, words)
}

fn markdown(rng: &mut StdRng) -> String {
    let mut body = String::new();
    let paragraphs = rng.gen_range(2..5);
    for p in 0..paragraphs {
        if p > 0 && rng.gen_bool(0.4) {
            let words = rng.gen_range(2..5);
            let _ = writeln!(body, "## {}\n", sentence(rng, words));
        }
        let sentences = rng.gen_range(3..7);
        let paragraph: Vec<String> = (0..sentences)
            .map(|_| {
                let words = rng.gen_range(6..14);
                format!("{}.", sentence(rng, words))
            })
            .collect();
        let _ = writeln!(body, "{}\n", paragraph.join(" "));
    }
    body
}
