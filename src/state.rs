use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::assets::staging::StagingDir;
use crate::assets::AssetHost;
use crate::auth::google::IdentityProvider;
use crate::auth::tokens::TokenService;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenService>,
    pub assets: Arc<dyn AssetHost>,
    pub identity: Arc<dyn IdentityProvider>,
    pub staging: StagingDir,
}
