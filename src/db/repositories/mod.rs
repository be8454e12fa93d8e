mod sessions;
mod sightings;
