mod services;

pub use services::{SYSTEM_PROMPT, WorkbenchServices, WorkbenchServicesBuilder};
