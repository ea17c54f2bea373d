//! Typed property routing for analyzers.
//!
//! Each analyzer declares a static [`PropertyTable`] mapping public property
//! names to a getter/setter pair. Lookups of undeclared names fail with
//! [`ConfigError::UnknownProperty`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::analysis::Analyzer;
use crate::error::ConfigError;

/// Client-facing property values, in declaration or request order.
pub type PropertyMap = serde_json::Map<String, Value>;

/// One public property of analyzer type `A`.
pub struct Property<A> {
    pub name: &'static str,
    pub get: fn(&A) -> Value,
    pub set: fn(&mut A, Value) -> Result<(), ConfigError>,
}

/// Static name -> accessor mapping for analyzer type `A`.
pub struct PropertyTable<A: 'static> {
    entries: &'static [Property<A>],
}

impl<A> PropertyTable<A> {
    pub const fn new(entries: &'static [Property<A>]) -> Self {
        Self { entries }
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|p| p.name).collect()
    }

    pub fn get(&self, target: &A, name: &str) -> Result<Value, ConfigError> {
        let property = self.lookup(name)?;
        Ok((property.get)(target))
    }

    pub fn set(&self, target: &mut A, name: &str, value: Value) -> Result<(), ConfigError> {
        let property = self.lookup(name)?;
        (property.set)(target, value)
    }

    fn lookup(&self, name: &str) -> Result<&Property<A>, ConfigError> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownProperty(name.to_string()))
    }
}

/// Convert a JSON value into a property's type.
pub fn parse_value<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::invalid_value(name, e.to_string()))
}

/// Apply a batch of updates in request order.
///
/// `null` values are skipped. The batch stops at the first failure; updates
/// applied before it stay applied. Returns how many values were written.
pub fn apply_updates(
    analyzer: &mut dyn Analyzer,
    updates: &PropertyMap,
) -> Result<usize, ConfigError> {
    let mut applied = 0;
    for (name, value) in updates {
        if value.is_null() {
            continue;
        }
        analyzer.set_property(name, value.clone())?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisOutput, Analyzer};
    use crate::error::AnalysisError;
    use crate::pipeline::Snapshot;
    use serde_json::json;

    #[derive(Default)]
    struct Gain {
        gain: f32,
        offset: f32,
    }

    static GAIN_PROPERTIES: PropertyTable<Gain> = PropertyTable::new(&[
        Property {
            name: "gain",
            get: |a| Value::from(a.gain),
            set: |a, v| {
                a.gain = parse_value("gain", v)?;
                Ok(())
            },
        },
        Property {
            name: "offset",
            get: |a| Value::from(a.offset),
            set: |a, v| {
                a.offset = parse_value("offset", v)?;
                Ok(())
            },
        },
    ]);

    impl Analyzer for Gain {
        fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
            Ok(AnalysisOutput::vector(
                snapshot.as_slice().iter().map(|x| x * self.gain + self.offset).collect(),
            ))
        }

        fn property_names(&self) -> Vec<&'static str> {
            GAIN_PROPERTIES.names()
        }

        fn get_property(&self, name: &str) -> Result<Value, ConfigError> {
            GAIN_PROPERTIES.get(self, name)
        }

        fn set_property(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
            GAIN_PROPERTIES.set(self, name, value)
        }
    }

    fn updates(value: Value) -> PropertyMap {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_null_values_are_skipped() {
        let mut analyzer = Gain::default();
        let applied = apply_updates(&mut analyzer, &updates(json!({"gain": 2.0, "offset": null})))
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(analyzer.gain, 2.0);
        assert_eq!(analyzer.offset, 0.0);
    }

    #[test]
    fn test_batch_stops_at_first_unknown_name() {
        let mut analyzer = Gain::default();
        let err = apply_updates(
            &mut analyzer,
            &updates(json!({"gain": 3.0, "volume": 1, "offset": 5.0})),
        )
        .unwrap_err();

        assert_eq!(err, ConfigError::UnknownProperty("volume".into()));
        assert_eq!(analyzer.gain, 3.0, "updates before the failure stay applied");
        assert_eq!(analyzer.offset, 0.0, "updates after the failure are not applied");
    }

    #[test]
    fn test_bad_value_type_is_a_config_error() {
        let mut analyzer = Gain::default();
        let err = apply_updates(&mut analyzer, &updates(json!({"gain": "loud"}))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "gain"));
    }

    #[test]
    fn test_client_properties_full_and_subset() {
        let analyzer = Gain {
            gain: 1.5,
            offset: -1.0,
        };

        let all = analyzer.get_client_properties(None).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["gain", "offset"]);

        let subset = analyzer
            .get_client_properties(Some(&["offset".to_string()]))
            .unwrap();
        assert_eq!(Value::Object(subset), json!({"offset": -1.0}));

        assert!(analyzer
            .get_client_properties(Some(&["nope".to_string()]))
            .is_err());
    }
}
