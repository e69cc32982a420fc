mod migrations;
mod store;

pub use store::WorkbenchStore;
