use super::execute;
use crate::db::place::{AddPlace, DeletePlace, InternalPlace, ListPlaces, PlaceId};
use crate::error::Error;
use crate::identity::Caller;
use tracing::{info, instrument};

#[instrument(skip(caller, description), fields(user_id = %caller.user_id))]
pub async fn add_place(
    caller: &Caller,
    name: &str,
    description: Option<&str>,
) -> Result<InternalPlace, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("name is required"));
    }
    let description = description
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .map(str::to_owned);

    let place = execute(AddPlace {
        added_by: caller.user_id.clone(),
        name: name.to_owned(),
        description,
    })
    .await?;
    info!(place_id = %place.id, "Place added");
    Ok(place)
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn delete_place(caller: &Caller, place_id: PlaceId) -> Result<InternalPlace, Error> {
    let place = execute(DeletePlace {
        place_id,
        requested_by: caller.user_id.clone(),
        role: caller.role,
    })
    .await?;
    info!(place_id = %place.id, "Place deleted");
    Ok(place)
}

#[instrument]
pub async fn list_places() -> Result<Vec<InternalPlace>, Error> {
    execute(ListPlaces).await
}
