use mongodb::Database;

pub struct AppState {
    pub db: Database,
}
