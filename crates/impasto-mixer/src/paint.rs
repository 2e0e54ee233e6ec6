//! A paint as a Kubelka-Munk coefficient pair.

use impasto_core::vec::Vec3;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

/// Absorption and scattering coefficients of one paint, per linear RGB
/// channel. Serialized as `{ "K": [r, g, b], "S": [r, g, b] }`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaintCoeff {
    /// Absorption.
    pub k: Vec3,
    /// Scattering.
    pub s: Vec3,
}

impl PaintCoeff {
    pub fn new(k: Vec3, s: Vec3) -> Self {
        Self { k, s }
    }
}

impl Serialize for PaintCoeff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PaintCoeff", 2)?;
        state.serialize_field("K", &[self.k.x, self.k.y, self.k.z])?;
        state.serialize_field("S", &[self.s.x, self.s.y, self.s.z])?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PaintCoeff {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoeffVisitor;

        impl<'de> Visitor<'de> for CoeffVisitor {
            type Value = PaintCoeff;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an object with \"K\" and \"S\" 3-element arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PaintCoeff, A::Error> {
                let mut k: Option<[f64; 3]> = None;
                let mut s: Option<[f64; 3]> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "K" => k = Some(map.next_value()?),
                        "S" => s = Some(map.next_value()?),
                        other => {
                            return Err(de::Error::unknown_field(other, &["K", "S"]));
                        }
                    }
                }
                let k = k.ok_or_else(|| de::Error::missing_field("K"))?;
                let s = s.ok_or_else(|| de::Error::missing_field("S"))?;
                Ok(PaintCoeff {
                    k: Vec3::new(k[0], k[1], k[2]),
                    s: Vec3::new(s[0], s[1], s[2]),
                })
            }
        }

        deserializer.deserialize_map(CoeffVisitor)
    }
}

/// The near-transparent dilution paint used to thin palette paints
/// before stroking: almost no absorption, very little scattering.
pub fn thinning_medium() -> PaintCoeff {
    PaintCoeff::new(Vec3::splat(1e-4), Vec3::splat(1e-2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let p = PaintCoeff::new(Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.4, 0.5, 0.6));
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"K":[0.1,0.2,0.3],"S":[0.4,0.5,0.6]}"#);
        let back: PaintCoeff = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_rejects_missing_field() {
        let r: Result<PaintCoeff, _> = serde_json::from_str(r#"{"K":[0.1,0.2,0.3]}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_thinning_medium_is_nearly_clear() {
        let p = thinning_medium();
        assert!(p.k.max_element() < 1e-3);
        assert!(p.s.max_element() < 0.1);
    }
}
