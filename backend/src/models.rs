pub use shared::{
    ApiError, CandidatePlace, Category, CategoryFilter, Coordinate, GeocodeOriginRequest, Origin,
    OriginId, OriginSlot, OriginSource, SearchParameters, SessionPhase, SessionSnapshot,
    SetOriginRequest, TravelMode, TravelTimes, UpdateSearchRequest,
};
