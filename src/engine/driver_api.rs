use super::helpers::fetch_driver;
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::DriverAPI,
    auth::{Platform, User},
    entities::{Driver, NewDriver},
    error::Error,
};

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_driver(&self, user: User, params: NewDriver) -> Result<Driver, Error> {
        self.authorize(user.clone(), "create_driver", Platform::default())?;

        let driver = Driver::new(params)?;
        self.store.insert_driver(&driver).await?;

        tracing::info!(driver_id = %driver.id, "driver registered");

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver(&self, user: User, id: Uuid) -> Result<Driver, Error> {
        let driver = fetch_driver(&self.store, id).await?;

        self.authorize(user, "read", driver.clone())?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn list_drivers(&self, user: User) -> Result<Vec<Driver>, Error> {
        self.authorize(user, "list_drivers", Platform::default())?;

        self.store.list_drivers().await
    }
}
