pub mod grants;
pub mod import_runs;
pub mod importing;
pub mod maintenance;
pub mod scraping;
pub mod voting;
