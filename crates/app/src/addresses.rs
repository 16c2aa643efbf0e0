use chrono::Utc;

use storefront_auth::{Permission, Principal};
use storefront_core::AggregateId;
use storefront_infra::projections::AddressReadModel;
use storefront_orders::{
    Address, AddressCommand, AddressDetails, AddressId, CreateAddress, DeleteAddress, UpdateAddress,
};

use crate::errors::AppError;
use crate::services::Storefront;

impl Storefront {
    pub fn create_address(&self, principal: &Principal, details: AddressDetails) -> Result<Address, AppError> {
        self.require(principal, &Permission::ADDRESSES_MANAGE)?;

        let address_id = AddressId::new(AggregateId::new());
        let address = self.execute::<Address>(
            address_id.0,
            AddressCommand::CreateAddress(CreateAddress {
                address_id,
                owner: principal.user_id,
                details,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%address_id, user_id = %principal.user_id, "address created");
        Ok(address)
    }

    pub fn update_address(
        &self,
        principal: &Principal,
        address_id: AddressId,
        details: AddressDetails,
    ) -> Result<Address, AppError> {
        self.require(principal, &Permission::ADDRESSES_MANAGE)?;
        self.owned_address(principal, address_id)?;

        let address = self.execute::<Address>(
            address_id.0,
            AddressCommand::UpdateAddress(UpdateAddress {
                address_id,
                details,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%address_id, "address updated");
        Ok(address)
    }

    pub fn delete_address(&self, principal: &Principal, address_id: AddressId) -> Result<(), AppError> {
        self.require(principal, &Permission::ADDRESSES_MANAGE)?;
        self.owned_address(principal, address_id)?;

        self.execute::<Address>(
            address_id.0,
            AddressCommand::DeleteAddress(DeleteAddress {
                address_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%address_id, "address deleted");
        Ok(())
    }

    pub fn my_addresses(&self, principal: &Principal) -> Result<Vec<AddressReadModel>, AppError> {
        self.require(principal, &Permission::ADDRESSES_MANAGE)?;
        Ok(self.addresses.by_owner(principal.user_id))
    }

    pub fn address(&self, principal: &Principal, address_id: AddressId) -> Result<AddressReadModel, AppError> {
        self.owned_address(principal, address_id)
    }

    /// A live address readable by the principal: their own, or any with `ORDERS_ANY`.
    fn owned_address(&self, principal: &Principal, address_id: AddressId) -> Result<AddressReadModel, AppError> {
        let address = self
            .addresses
            .get(&address_id)
            .ok_or_else(|| AppError::not_found(format!("address {address_id}")))?;
        self.require_owner(principal, address.owner, &Permission::ORDERS_ANY)?;
        Ok(address)
    }
}
