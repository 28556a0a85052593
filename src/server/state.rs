use crate::geo::CityIndex;
use crate::location::AddressResolver;
use std::sync::Arc;

/// Shared by every request. The resolver locks its own cache internally.
pub struct AppState {
    pub resolver: AddressResolver,
    pub cities: Arc<CityIndex>,
}
