//! Shared fixtures for registry integration tests

#![allow(dead_code)]

use elohim_things::{Channel, Config, Metadata, OwnerContext, Services, Thing};
use tempfile::TempDir;
use uuid::Uuid;

pub const WRONG_VALUE: &str = "wrong-value";

/// Services over an on-disk database in a temporary directory
pub fn open_services() -> (Services, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        storage_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let services = Services::open(&config).unwrap();
    (services, temp_dir)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap()
}

pub fn save_thing(services: &Services, ctx: &OwnerContext) -> Thing {
    let thing = Thing {
        id: new_id(),
        key: Some(new_id()),
        ..Default::default()
    };
    services.things.save(ctx, vec![thing]).unwrap().remove(0)
}

pub fn save_channel(services: &Services, ctx: &OwnerContext) -> Channel {
    let channel = Channel {
        id: new_id(),
        ..Default::default()
    };
    services.channels.save(ctx, vec![channel]).unwrap().remove(0)
}
