mod booking_api;
mod driver_api;
mod helpers;

#[cfg(test)]
mod testing;

use oso::Oso;

use crate::{
    api::API,
    auth::authorizor,
    db::DynStore,
    error::{unauthorized_error, Error},
    matching::DynMatchingPolicy,
};

/// Booking lifecycle manager. Holds no booking state of its own: every
/// command reads from the store, validates and commits back through it.
pub struct Engine {
    store: DynStore,
    authorizor: Oso,
    matching: DynMatchingPolicy,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all, fields(matching = matching.name()))]
    pub fn new(store: DynStore, matching: DynMatchingPolicy) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: authorizor::new()?,
            matching,
        })
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    fn is_allowed<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<bool, Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        Ok(self.authorizor.is_allowed(actor, action, resource)?)
    }
}

impl API for Engine {}
