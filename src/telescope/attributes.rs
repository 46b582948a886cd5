use std::time::Duration;

use crate::attribute::{AccessLevel, AttributeError, AttributeMeta, AttributeStore};

pub const STATE: &str = "state";
pub const AZ_CMD: &str = "az_cmd";
pub const EL_CMD: &str = "el_cmd";
pub const AZ_OBJ: &str = "az_obj";
pub const EL_OBJ: &str = "el_obj";
pub const AZ: &str = "az";
pub const EL: &str = "el";
pub const AZ_CURRENT: &str = "az_current";
pub const EL_CURRENT: &str = "el_current";
pub const RA_OBJ: &str = "ra_obj";
pub const DEC_OBJ: &str = "dec_obj";
pub const AZ_OFF: &str = "az_off";
pub const EL_OFF: &str = "el_off";
pub const SOURCE_NAME: &str = "source_name";

/// Declares every attribute the controller publishes.
pub fn declare(store: &mut AttributeStore, tick: Duration) -> Result<(), AttributeError> {
    let angle = |label: &str, group: &str, description: &str| {
        AttributeMeta::new(label)
            .unit("deg")
            .group(group)
            .description(description)
            .polling_period(tick)
    };

    store.declare(
        STATE,
        AttributeMeta::new("State")
            .group("status")
            .description("Controller state")
            .polling_period(tick),
        "OFF",
    )?;
    store.declare(
        AZ_CMD,
        angle("AZ_cmd", "command", "Commanded azimuth").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(
        EL_CMD,
        angle("EL_cmd", "command", "Commanded elevation").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(AZ_OBJ, angle("AZ_obj", "target", "Azimuth sent to the ACU"), 0.0)?;
    store.declare(EL_OBJ, angle("EL_obj", "target", "Elevation sent to the ACU"), 0.0)?;
    store.declare(AZ, angle("AZ", "target", "Target azimuth before corrections"), 0.0)?;
    store.declare(EL, angle("EL", "target", "Target elevation before corrections"), 0.0)?;
    store.declare(
        AZ_CURRENT,
        angle("AZ_current", "position", "Azimuth reported by the ACU"),
        0.0,
    )?;
    store.declare(
        EL_CURRENT,
        angle("EL_current", "position", "Elevation reported by the ACU"),
        0.0,
    )?;
    store.declare(
        RA_OBJ,
        angle("RA_obj", "command", "Target right ascension").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(
        DEC_OBJ,
        angle("DEC_obj", "command", "Target declination").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(
        AZ_OFF,
        angle("AZ_off", "offset", "Azimuth offset").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(
        EL_OFF,
        angle("EL_off", "offset", "Elevation offset").writable(AccessLevel::Operator),
        0.0,
    )?;
    store.declare(
        SOURCE_NAME,
        AttributeMeta::new("SourceName")
            .group("command")
            .description("Name of the tracked source")
            .writable(AccessLevel::Operator),
        "",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_all_keys_once() {
        let mut store = AttributeStore::new(10);
        declare(&mut store, Duration::from_millis(200)).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 14);
        assert_eq!(snapshot[0].key, STATE);
        assert_eq!(snapshot[0].value.to_string(), "OFF");
        let az_current = store.get(AZ_CURRENT).unwrap().snapshot(false);
        assert_eq!(az_current.polling_period_ms, Some(200));
        assert!(!az_current.need_load);
        assert!(declare(&mut store, Duration::from_millis(200)).is_err());
    }
}
