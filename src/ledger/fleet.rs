use tracing::info;
use ulid::Ulid;

use crate::limits::{MAX_CAR_NUMBER_LEN, MAX_NAME_LEN};
use crate::model::*;
use crate::store::{CarPatch, TripStore};

use super::{require_owner, Ledger, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCar {
    pub model: String,
    pub car_number: String,
    pub pricing: Pricing,
}

/// Registration plates are compared without whitespace, upper-cased.
pub(crate) fn normalize_car_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn check_pricing(p: &Pricing) -> Result<(), LedgerError> {
    if p.price_per_km.0 <= 0 {
        return Err(LedgerError::Validation("price_per_km must be positive".into()));
    }
    if p.mileage.0 <= 0 {
        return Err(LedgerError::Validation("mileage must be positive".into()));
    }
    if p.driver_cost.is_negative() || p.extra_day_cost.is_negative() {
        return Err(LedgerError::Validation("costs must not be negative".into()));
    }
    Ok(())
}

impl<S: TripStore> Ledger<S> {
    /// Record a profile created by the sign-up flow.
    pub async fn register_profile(&self, id: ProfileId, full_name: String, role: Role) -> Result<Profile, LedgerError> {
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(LedgerError::Validation("full_name is required".into()));
        }
        if full_name.len() > MAX_NAME_LEN {
            return Err(LedgerError::Validation("full_name too long".into()));
        }
        if self.store.profile(id).await.is_some() {
            return Err(LedgerError::Validation(format!("profile {id} is already registered")));
        }
        let profile = Profile { id, full_name, role };
        self.detached(move |store| async move { store.register_profile(profile).await })
            .await
    }

    pub async fn create_car(&self, who: &Identity, cmd: NewCar) -> Result<Car, LedgerError> {
        require_owner(who, "register cars")?;
        match self.store.profile(who.id).await {
            Some(p) if p.role == Role::Owner => {}
            _ => return Err(LedgerError::Forbidden("register cars without an owner profile")),
        }

        let model = cmd.model.trim().to_string();
        let car_number = normalize_car_number(&cmd.car_number);
        if model.is_empty() || car_number.is_empty() {
            return Err(LedgerError::Validation("model and car_number are required".into()));
        }
        if model.len() > MAX_NAME_LEN || car_number.len() > MAX_CAR_NUMBER_LEN {
            return Err(LedgerError::Validation("model or car_number too long".into()));
        }
        check_pricing(&cmd.pricing)?;

        let car = Car {
            id: Ulid::new(),
            owner_id: who.id,
            model,
            car_number,
            pricing: cmd.pricing,
            active: true,
            deleted: false,
        };
        let car = self
            .detached(move |store| async move { store.insert_car(car).await })
            .await?;
        info!("car {} ({}) registered by {}", car.id, car.car_number, who.id);
        Ok(car)
    }

    /// One of the caller's cars. Missing, foreign and deleted cars all read
    /// as not found.
    pub async fn get_car(&self, who: &Identity, car_id: CarId) -> Result<Car, LedgerError> {
        require_owner(who, "view cars")?;
        self.store
            .car(car_id)
            .await
            .filter(|c| c.owner_id == who.id && !c.deleted)
            .ok_or(LedgerError::NotFound(car_id))
    }

    pub async fn list_cars(&self, who: &Identity) -> Result<Vec<Car>, LedgerError> {
        require_owner(who, "list cars")?;
        let mut cars = self.store.cars_owned_by(who.id).await;
        cars.retain(|c| !c.deleted);
        Ok(cars)
    }

    /// New pricing applies to future bookings and edits only.
    pub async fn update_pricing(&self, who: &Identity, car_id: CarId, pricing: Pricing) -> Result<Car, LedgerError> {
        check_pricing(&pricing)?;
        self.patch_owned_car(who, car_id, CarPatch::Pricing(pricing)).await
    }

    /// Flip the car between active and under maintenance.
    pub async fn toggle_active(&self, who: &Identity, car_id: CarId) -> Result<Car, LedgerError> {
        let car = self.patch_owned_car(who, car_id, CarPatch::ToggleActive).await?;
        info!("car {car_id} is now {}", if car.active { "active" } else { "inactive" });
        Ok(car)
    }

    /// Soft-delete: the car stays on record for its trips but can no longer
    /// be booked, listed or changed.
    pub async fn delete_car(&self, who: &Identity, car_id: CarId) -> Result<Car, LedgerError> {
        let car = self.patch_owned_car(who, car_id, CarPatch::SoftDelete).await?;
        info!("car {car_id} deleted by {}", who.id);
        Ok(car)
    }

    async fn patch_owned_car(&self, who: &Identity, car_id: CarId, patch: CarPatch) -> Result<Car, LedgerError> {
        self.get_car(who, car_id).await?;
        self.detached(move |store| async move { store.update_car(car_id, patch).await })
            .await
            .map_err(|e| match e {
                // Deleted between the ownership check and the write.
                LedgerError::ResourceUnavailable(_) => LedgerError::NotFound(car_id),
                e => e,
            })
    }
}
