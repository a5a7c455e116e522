mod links;
mod webhook;

use storefront_engine::{
    api::objects::LinkSettings,
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, MockGateway},
    LinkFlowApi,
    SqliteDatabase,
};

pub(crate) async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

pub(crate) fn link_api(db: SqliteDatabase, gateway: MockGateway) -> LinkFlowApi<SqliteDatabase, MockGateway> {
    LinkFlowApi::new(db, gateway, EventProducers::default(), LinkSettings::default())
}
