use anyhow::Context;
use image::DynamicImage;
use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use tempdir::TempDir;
use tokio::{
    fs as async_fs,
    sync::{RwLock, RwLockReadGuard},
};
use uuid::Uuid;

use std::{
    fs::{self, File},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use tar::{Archive, Builder};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const DB_FILE_NAME: &str = "survey.db";
const IMAGE_DIR_NAME: &str = "images";

/// Unpacked survey archive: a SQLite database plus fetched imagery, living
/// in a temp working directory until packed back into the survey file.
pub(super) struct SurveyState {
    survey_file: PathBuf,
    working_dir: TempDir,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for SurveyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurveyState")
            .field("survey_file", &self.survey_file)
            .field("working_dir", &self.working_dir.path())
            .finish()
    }
}

impl SurveyState {
    /// Acquire a pooled connection and hold the pool read lock for the entire
    /// lifetime of the returned guard, so save (which takes the write lock)
    /// drains in-flight queries first.
    pub(super) async fn conn(&self) -> anyhow::Result<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;
        let conn = pool_guard.acquire().await?;

        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    /// Load a stored image by archive filename.
    pub(super) async fn load_image(&self, image_fname: &str) -> anyhow::Result<DynamicImage> {
        let img_path = self
            .working_dir
            .path()
            .join(IMAGE_DIR_NAME)
            .join(image_fname);
        let img = image::open(&img_path)
            .with_context(|| format!("Failed to open stored image {:?}", img_path))?;
        Ok(img)
    }

    /// Store fetched image bytes exactly as received, returning the filename.
    pub(super) async fn store_image_bytes(
        &self,
        bytes: &[u8],
        extension: &str,
    ) -> anyhow::Result<String> {
        let images_dir = self.working_dir.path().join(IMAGE_DIR_NAME);
        let img_fname = format!("{}.{}", Uuid::new_v4(), extension);
        let dest_path = images_dir.join(&img_fname);
        async_fs::write(&dest_path, bytes)
            .await
            .with_context(|| format!("Failed to write image to {:?}", dest_path))?;
        Ok(img_fname)
    }

    pub(super) async fn delete_image(&self, image_fname: &str) -> anyhow::Result<()> {
        let img_path = self
            .working_dir
            .path()
            .join(IMAGE_DIR_NAME)
            .join(image_fname);
        async_fs::remove_file(&img_path)
            .await
            .with_context(|| format!("Failed to delete stored image {:?}", img_path))?;
        Ok(())
    }

    /// Create a tar.zst archive from the working directory.
    fn save_tar_zstd(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.survey_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let out = File::create(&self.survey_file)
            .with_context(|| format!("Failed to create survey archive {:?}", self.survey_file))?;

        let encoder = ZstdEncoder::new(out, 3)
            .with_context(|| format!("Failed to create zstd encoder for {:?}", self.survey_file))?;

        let mut tar = Builder::new(encoder);

        tar.append_dir_all(".", self.working_dir.path())
            .with_context(|| format!("Failed to add {:?} to tar", self.working_dir.path()))?;

        let encoder = tar
            .into_inner()
            .with_context(|| format!("Failed to finalize tar for {:?}", self.survey_file))?;

        encoder
            .finish()
            .with_context(|| format!("Failed to finalize zstd stream for {:?}", self.survey_file))?;

        Ok(())
    }

    /// Exclusive close+pack:
    /// - waits for all in-flight read queries (because it takes a WRITE lock)
    /// - checkpoints WAL to ensure survey.db is current
    /// - closes pool to release file handles
    /// - archives working dir
    pub(super) async fn save_survey(&self) -> anyhow::Result<()> {
        self.internal_close_and_pack(true).await
    }

    pub(super) async fn internal_close_and_pack(&self, reopen: bool) -> anyhow::Result<()> {
        // Take the exclusive write lock for the whole operation:
        // no queries run while we checkpoint/close/pack.
        let mut pool_guard = self.pool.write().await;

        // Flush WAL into main DB and truncate it
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;

        // Release file handles before packing.
        pool_guard.close().await;

        self.save_tar_zstd()?;

        if reopen {
            let db_file = self.working_dir.path().join(DB_FILE_NAME);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options(&db_file))
                .await?;
            *pool_guard = pool;
        }
        Ok(())
    }

    pub(super) async fn new<P: AsRef<Path>>(survey_file: P) -> anyhow::Result<Self> {
        let survey_file = survey_file.as_ref().to_path_buf();

        // Ensure the survey file exists; if not, create an empty tar.zst at
        // that location (parent directory must exist).
        if !survey_file.is_file() {
            if survey_file.parent().map(|p| p.is_dir()).unwrap_or(false) {
                let out = File::create(&survey_file)
                    .with_context(|| format!("Failed to create survey archive {:?}", survey_file))?;

                let encoder = ZstdEncoder::new(out, 3)
                    .with_context(|| format!("Failed to create zstd encoder for {:?}", survey_file))?;

                let tar = Builder::new(encoder);
                let encoder = tar
                    .into_inner()
                    .with_context(|| format!("Failed to finalize empty tar {:?}", survey_file))?;

                encoder
                    .finish()
                    .with_context(|| format!("Failed to finalize empty zstd stream {:?}", survey_file))?;
            } else {
                anyhow::bail!("Survey file parent does not exist: {:?}", survey_file);
            }
        }

        let working_dir = TempDir::new("lumiroute_survey")?;

        // Unpack the survey archive into the working dir.
        {
            let f = File::open(&survey_file)
                .with_context(|| format!("Failed to open survey archive {:?}", survey_file))?;

            let decoder = ZstdDecoder::new(f)
                .with_context(|| format!("Invalid zstd stream in {:?}", survey_file))?;

            let mut archive = Archive::new(decoder);
            archive.unpack(working_dir.path()).with_context(|| {
                format!(
                    "Failed to extract archive {:?} into {:?}",
                    survey_file,
                    working_dir.path()
                )
            })?;
        }

        // Archive layout expectations
        let db_file = working_dir.path().join(DB_FILE_NAME);
        let images_dir = working_dir.path().join(IMAGE_DIR_NAME);

        let db_exists = db_file.is_file();
        let images_exist = images_dir.is_dir();

        match (db_exists, images_exist) {
            (true, true) => {}
            (false, false) => {
                fs::create_dir_all(&images_dir)?;
                File::create(&db_file)?;
            }
            (true, false) => anyhow::bail!(
                "Corrupt survey: database exists ({:?}) but images dir missing ({:?})",
                db_file,
                images_dir
            ),
            (false, true) => anyhow::bail!(
                "Corrupt survey: images dir exists ({:?}) but database missing ({:?})",
                images_dir,
                db_file
            ),
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options(&db_file))
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            survey_file,
            working_dir,
            pool: RwLock::new(pool),
        })
    }
}

fn connect_options(db_file: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
}

pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
