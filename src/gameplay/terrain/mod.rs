pub mod generator;
pub mod noise;
pub mod streamer;

pub use streamer::TerrainStreamer;
