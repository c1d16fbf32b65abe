//! # Named parameters
//!
//! Tunable values are exposed as a flat list of named, bounded properties. The list drives both
//! configuration validation and textual `name=value` overrides.

use crate::prelude::v1::*;
use std::fmt::Display;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Object with named properties.
pub trait Properties {
    /// Get available properties.
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)>;

    fn props(&mut self) -> Vec<(String, Property)> {
        self.props_mut()
            .into_iter()
            .map(|(n, p)| (n.to_string(), p.into()))
            .collect()
    }

    /// Ensure every bounded property is within its bounds.
    fn check_bounds(&mut self) -> Result<()> {
        for (name, prop) in self.props_mut() {
            prop.check(name)?;
        }
        Ok(())
    }

    /// Parse and assign a property by name.
    ///
    /// # Arguments
    ///
    /// * `name` - name of the property, as listed by [`Properties::props_mut`].
    /// * `value` - textual value to parse.
    fn set_prop(&mut self, name: &str, value: &str) -> Result<()> {
        let mut props = self.props_mut();

        let (_, prop) = props
            .iter_mut()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| anyhow!("unknown property {name}"))?;

        prop.parse_set(value)
            .map_err(|e| anyhow!("invalid value for {name}: {e}"))
    }
}

/// Property with a lower and upper bound.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct BoundedProp<T> {
    pub val: T,
    pub min: T,
    pub max: T,
}

impl<T> Deref for BoundedProp<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.val
    }
}

impl<T: PartialOrd> BoundedProp<T> {
    pub fn in_bounds(&self) -> bool {
        self.val >= self.min && self.val <= self.max
    }
}

impl<'a, T: Copy> From<BoundedPropMut<'a, T>> for BoundedProp<T> {
    fn from(BoundedPropMut { val, min, max }: BoundedPropMut<'a, T>) -> Self {
        Self {
            val: *val,
            min,
            max,
        }
    }
}

/// Snapshot of a property's value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Property {
    Bool(bool),
    Float(BoundedProp<f32>),
    Usize(BoundedProp<usize>),
}

impl<'a> From<PropertyMut<'a>> for Property {
    fn from(prop: PropertyMut<'a>) -> Self {
        match prop {
            PropertyMut::Bool(b) => Self::Bool(*b),
            PropertyMut::Float(p) => Self::Float(p.into()),
            PropertyMut::Usize(p) => Self::Usize(p.into()),
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(p) => write!(f, "{} [{}, {}]", p.val, p.min, p.max),
            Self::Usize(p) => write!(f, "{} [{}, {}]", p.val, p.min, p.max),
        }
    }
}

/// Mutable reference to a value with a lower and upper bound.
pub struct BoundedPropMut<'a, T> {
    pub val: &'a mut T,
    pub min: T,
    pub max: T,
}

impl<'a, T> Deref for BoundedPropMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.val
    }
}

impl<'a, T> DerefMut for BoundedPropMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.val
    }
}

impl<'a, T: PartialOrd + Copy + Display> BoundedPropMut<'a, T> {
    fn check(&self, name: &str) -> Result<()> {
        ensure!(
            *self.val >= self.min && *self.val <= self.max,
            "{name} = {} is out of bounds [{}, {}]",
            self.val,
            self.min,
            self.max
        );
        Ok(())
    }
}

impl<'a, T: FromStr> BoundedPropMut<'a, T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn parse_set(&mut self, value: &str) -> Result<()> {
        *self.val = value.trim().parse()?;
        Ok(())
    }
}

/// Mutable reference to a property's value.
pub enum PropertyMut<'a> {
    Bool(&'a mut bool),
    Float(BoundedPropMut<'a, f32>),
    Usize(BoundedPropMut<'a, usize>),
}

impl<'a> PropertyMut<'a> {
    /// Create a boolean property.
    ///
    /// # Arguments
    ///
    /// * `b` - reference to the underlying boolean to be mutated.
    pub fn bool(b: &'a mut bool) -> Self {
        Self::Bool(b)
    }

    /// Create a floating point property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying float to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn float(val: &'a mut f32, min: f32, max: f32) -> Self {
        Self::Float(BoundedPropMut { val, min, max })
    }

    /// Create an integer property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying usize to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn usize(val: &'a mut usize, min: usize, max: usize) -> Self {
        Self::Usize(BoundedPropMut { val, min, max })
    }

    /// Assign a value of the same kind.
    pub fn set(&mut self, other: &Property) {
        match (self, other) {
            (Self::Bool(b), Property::Bool(ob)) => **b = *ob,
            (Self::Float(val), Property::Float(oval)) => *val.val = oval.val,
            (Self::Usize(val), Property::Usize(oval)) => *val.val = oval.val,
            _ => {}
        }
    }

    /// Parse a textual value and assign it, without checking bounds.
    pub fn parse_set(&mut self, value: &str) -> Result<()> {
        match self {
            Self::Bool(b) => **b = value.trim().parse()?,
            Self::Float(p) => p.parse_set(value)?,
            Self::Usize(p) => p.parse_set(value)?,
        }
        Ok(())
    }

    /// Fail if the value lies outside its bounds.
    pub fn check(&self, name: &str) -> Result<()> {
        match self {
            Self::Bool(_) => Ok(()),
            Self::Float(p) => {
                ensure!(!p.val.is_nan(), "{name} is not a number");
                p.check(name)
            }
            Self::Usize(p) => p.check(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Knobs {
        gain: f32,
        taps: usize,
        enabled: bool,
    }

    impl Properties for Knobs {
        fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
            vec![
                ("gain", PropertyMut::float(&mut self.gain, 0.0, 1.0)),
                ("taps", PropertyMut::usize(&mut self.taps, 1, 9)),
                ("enabled", PropertyMut::bool(&mut self.enabled)),
            ]
        }
    }

    #[test]
    fn set_by_name() {
        let mut knobs = Knobs::default();

        knobs.set_prop("gain", "0.25").unwrap();
        knobs.set_prop("taps", " 5 ").unwrap();
        knobs.set_prop("enabled", "true").unwrap();

        assert_eq!(knobs.gain, 0.25);
        assert_eq!(knobs.taps, 5);
        assert!(knobs.enabled);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        let mut knobs = Knobs::default();

        assert!(knobs.set_prop("volume", "1").is_err());
        assert!(knobs.set_prop("taps", "-1").is_err());
        assert!(knobs.set_prop("gain", "loud").is_err());
    }

    #[test]
    fn bounds_are_checked() {
        let mut knobs = Knobs {
            taps: 3,
            ..Default::default()
        };
        assert!(knobs.check_bounds().is_ok());

        knobs.set_prop("gain", "1.5").unwrap();
        let err = knobs.check_bounds().unwrap_err().to_string();
        assert!(err.contains("gain"), "{err}");

        knobs.gain = f32::NAN;
        assert!(knobs.check_bounds().is_err());
    }

    #[test]
    fn snapshot_and_restore() {
        let mut knobs = Knobs {
            gain: 0.5,
            taps: 2,
            enabled: false,
        };

        let snapshot = knobs.props();
        assert_eq!(snapshot[1].1, Property::Usize(BoundedProp { val: 2, min: 1, max: 9 }));
        assert_eq!(snapshot[0].1.to_string(), "0.5 [0, 1]");

        knobs.taps = 7;
        for ((_, mut prop), (_, saved)) in knobs.props_mut().into_iter().zip(&snapshot) {
            prop.set(saved);
        }
        assert_eq!(knobs.taps, 2);
    }
}
