// SPDX-License-Identifier: PMPL-1.0-or-later
//! Meta boosts: per-document scoring modifiers.
//!
//! Each boost yields an *effect* for a document, or nothing when it does not
//! apply. Effects multiply the base score, except those wrapped in
//! [`MetaBoost::Add`], which are summed into a separate additive term:
//!
//! ```text
//! score = base × Π(multiplicative effects) + Σ(add.value × inner effect)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{QueryError, Result};
use crate::filter::Filter;
use crate::geo::{haversine_km, LatLng};
use crate::text::{overlap_ratio, token_set};
use crate::value::{as_number, describe, text_form};

/// Use a nested boost's effect additively, scaled by `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddBoost {
    pub value: f64,
    pub boost: Box<MetaBoost>,
}

/// Apply `value` to documents matching `filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBoost {
    pub value: f64,
    pub filter: Filter,
}

/// Which side of the radius a geo boost rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeoRegion {
    Inside,
    Outside,
}

/// Apply `value` depending on distance from a target point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBoost {
    pub value: f64,
    pub lat_field: String,
    pub lng_field: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    pub region: GeoRegion,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalPoint {
    pub point: f64,
    pub value: f64,
}

/// Piecewise-linear effect over a numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalBoost {
    pub field: String,
    /// At least two points, strictly ascending by `point`.
    pub points: Vec<IntervalPoint>,
}

/// Effect that peaks at `reference` and falls off linearly towards the edges
/// of `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceBoost {
    pub value: f64,
    pub field: String,
    #[serde(rename = "ref")]
    pub reference: f64,
    pub min: f64,
    pub max: f64,
}

/// Effect proportional to the share of `elements` present in a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBoost {
    pub value: f64,
    pub field: String,
    pub elements: Vec<String>,
}

/// Effect proportional to the share of `text` tokens present in a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBoost {
    pub value: f64,
    pub field: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaBoost {
    Add(AddBoost),
    Filter(FilterBoost),
    Geo(GeoBoost),
    Interval(IntervalBoost),
    Distance(DistanceBoost),
    Element(ElementBoost),
    Text(TextBoost),
}

/// Accumulated boost terms for one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostedScore {
    pub multiplier: f64,
    pub additive: f64,
}

impl Default for BoostedScore {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            additive: 0.0,
        }
    }
}

impl BoostedScore {
    pub fn apply(&self, base: f64) -> f64 {
        base * self.multiplier + self.additive
    }
}

/// Combine `boosts` for `doc`.
pub fn combine(boosts: &[MetaBoost], doc: &Document) -> Result<BoostedScore> {
    let mut acc = BoostedScore::default();
    for boost in boosts {
        match boost {
            MetaBoost::Add(add) => {
                if let Some(effect) = add.boost.effect(doc)? {
                    acc.additive += add.value * effect;
                }
            }
            other => {
                if let Some(effect) = other.effect(doc)? {
                    acc.multiplier *= effect;
                }
            }
        }
    }
    Ok(acc)
}

/// Final score of `doc` given its base relevance score.
pub fn score(boosts: &[MetaBoost], doc: &Document, base: f64) -> Result<f64> {
    combine(boosts, doc).map(|b| b.apply(base))
}

impl MetaBoost {
    /// Effect of this boost for `doc`; `None` is neutral.
    pub fn effect(&self, doc: &Document) -> Result<Option<f64>> {
        match self {
            MetaBoost::Add(add) => Ok(add.boost.effect(doc)?.map(|e| add.value * e)),
            MetaBoost::Filter(b) => Ok(b.filter.evaluate(doc)?.then_some(b.value)),
            MetaBoost::Geo(b) => b.effect(doc),
            MetaBoost::Interval(b) => {
                let Some(x) = numeric_field(doc, &b.field)? else {
                    return Ok(None);
                };
                Ok(interpolate(&b.points, x))
            }
            MetaBoost::Distance(b) => b.effect(doc),
            MetaBoost::Element(b) => b.effect(doc),
            MetaBoost::Text(b) => b.effect(doc),
        }
    }

    /// Check the boost before evaluation. `path` locates it in the request.
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            MetaBoost::Add(add) => {
                finite(path, "add.value", add.value)?;
                add.boost.validate(&format!("{path}.add.boost"))
            }
            MetaBoost::Filter(b) => {
                finite(path, "filter.value", b.value)?;
                b.filter.validate(&format!("{path}.filter.filter"))
            }
            MetaBoost::Geo(b) => {
                let p = format!("{path}.geo");
                non_empty(&p, "lat_field", &b.lat_field)?;
                non_empty(&p, "lng_field", &b.lng_field)?;
                finite(&p, "value", b.value)?;
                if !LatLng::new(b.lat, b.lng).is_valid() {
                    return Err(QueryError::validation(
                        format!("{p}.lat"),
                        format!("target ({}, {}) is outside WGS84 range", b.lat, b.lng),
                    ));
                }
                if !(b.radius_km.is_finite() && b.radius_km >= 0.0) {
                    return Err(QueryError::validation(
                        format!("{p}.radius"),
                        "radius must be a non-negative number",
                    ));
                }
                Ok(())
            }
            MetaBoost::Interval(b) => {
                let p = format!("{path}.interval");
                non_empty(&p, "field", &b.field)?;
                if b.points.len() < 2 {
                    return Err(QueryError::validation(
                        format!("{p}.points"),
                        format!("needs at least 2 points, found {}", b.points.len()),
                    ));
                }
                for (i, pt) in b.points.iter().enumerate() {
                    finite(&p, &format!("points[{i}].point"), pt.point)?;
                    finite(&p, &format!("points[{i}].value"), pt.value)?;
                }
                if let Some(i) = b.points.windows(2).position(|w| w[0].point >= w[1].point) {
                    return Err(QueryError::validation(
                        format!("{p}.points[{}]", i + 1),
                        "points must be strictly ascending by point",
                    ));
                }
                Ok(())
            }
            MetaBoost::Distance(b) => {
                let p = format!("{path}.distance");
                non_empty(&p, "field", &b.field)?;
                finite(&p, "value", b.value)?;
                finite(&p, "ref", b.reference)?;
                finite(&p, "min", b.min)?;
                finite(&p, "max", b.max)?;
                if b.min >= b.max {
                    return Err(QueryError::validation(format!("{p}.max"), "max must exceed min"));
                }
                if !(b.min..=b.max).contains(&b.reference) {
                    return Err(QueryError::validation(
                        format!("{p}.ref"),
                        "ref must lie within [min, max]",
                    ));
                }
                Ok(())
            }
            MetaBoost::Element(b) => {
                let p = format!("{path}.element");
                non_empty(&p, "field", &b.field)?;
                finite(&p, "value", b.value)?;
                if b.elements.is_empty() {
                    return Err(QueryError::validation(
                        format!("{p}.elements"),
                        "element list is empty",
                    ));
                }
                Ok(())
            }
            MetaBoost::Text(b) => {
                let p = format!("{path}.text");
                non_empty(&p, "field", &b.field)?;
                finite(&p, "value", b.value)?;
                if token_set(&b.text).is_empty() {
                    return Err(QueryError::validation(
                        format!("{p}.text"),
                        "text has no tokens",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl GeoBoost {
    fn effect(&self, doc: &Document) -> Result<Option<f64>> {
        let (Some(lat), Some(lng)) = (
            numeric_field(doc, &self.lat_field)?,
            numeric_field(doc, &self.lng_field)?,
        ) else {
            return Ok(None);
        };
        let point = LatLng::new(lat, lng);
        if !point.is_valid() {
            return Err(QueryError::mismatch(
                &self.lat_field,
                "WGS84 coordinate",
                format!("({lat}, {lng})"),
            ));
        }
        let distance = haversine_km(point, LatLng::new(self.lat, self.lng));
        let applies = match self.region {
            GeoRegion::Inside => distance <= self.radius_km,
            GeoRegion::Outside => distance > self.radius_km,
        };
        Ok(applies.then_some(self.value))
    }
}

impl DistanceBoost {
    fn effect(&self, doc: &Document) -> Result<Option<f64>> {
        let Some(x) = numeric_field(doc, &self.field)? else {
            return Ok(None);
        };
        if x < self.min || x > self.max {
            return Ok(None);
        }
        let reach = (self.reference - self.min).max(self.max - self.reference);
        if reach <= 0.0 {
            return Ok(None);
        }
        let closeness = (1.0 - (x - self.reference).abs() / reach).clamp(0.0, 1.0);
        Ok(Some(self.value * closeness))
    }
}

impl ElementBoost {
    fn effect(&self, doc: &Document) -> Result<Option<f64>> {
        let Some(actual) = doc.value(&self.field)? else {
            return Ok(None);
        };
        let present: BTreeSet<String> = match actual {
            Value::Array(items) => items.iter().map(text_form).collect(),
            Value::String(s) => BTreeSet::from([s]),
            other => {
                return Err(QueryError::mismatch(
                    &self.field,
                    "string array",
                    describe(&other),
                ))
            }
        };
        let wanted: BTreeSet<&str> = self.elements.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Ok(None);
        }
        let shared = wanted.iter().filter(|e| present.contains(**e)).count();
        Ok(Some(self.value * shared as f64 / wanted.len() as f64))
    }
}

impl TextBoost {
    fn effect(&self, doc: &Document) -> Result<Option<f64>> {
        let Some(actual) = doc.value(&self.field)? else {
            return Ok(None);
        };
        let target = match actual {
            Value::String(s) => token_set(&s),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(token_set)
                .collect(),
            other => {
                return Err(QueryError::mismatch(&self.field, "text", describe(&other)))
            }
        };
        Ok(Some(self.value * overlap_ratio(&token_set(&self.text), &target)))
    }
}

/// Linear interpolation over strictly ascending points, clamped at the ends.
pub fn interpolate(points: &[IntervalPoint], x: f64) -> Option<f64> {
    let (first, last) = (points.first()?, points.last()?);
    if x <= first.point {
        return Some(first.value);
    }
    if x >= last.point {
        return Some(last.value);
    }
    // First point strictly above x; always in 1..len here.
    let idx = points.partition_point(|p| p.point <= x);
    let (lo, hi) = (points[idx - 1], points[idx]);
    let t = (x - lo.point) / (hi.point - lo.point);
    Some(lo.value + (hi.value - lo.value) * t)
}

fn numeric_field(doc: &Document, field: &str) -> Result<Option<f64>> {
    match doc.value(field)? {
        None => Ok(None),
        Some(v) => as_number(&v)
            .map(Some)
            .ok_or_else(|| QueryError::mismatch(field, "number", describe(&v))),
    }
}

fn finite(path: &str, name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QueryError::validation(format!("{path}.{name}"), "must be a finite number"))
    }
}

fn non_empty(path: &str, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(QueryError::validation(format!("{path}.{name}"), "field name is empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldOperator;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_json(value).unwrap()
    }

    fn interval(points: &[(f64, f64)]) -> IntervalBoost {
        IntervalBoost {
            field: "age".into(),
            points: points
                .iter()
                .map(|&(point, value)| IntervalPoint { point, value })
                .collect(),
        }
    }

    fn in_stock(value: f64) -> MetaBoost {
        MetaBoost::Filter(FilterBoost {
            value,
            filter: Filter::field(FieldOperator::EqualTo, "stock", json!(true)),
        })
    }

    #[test]
    fn test_filter_boost_neutral_when_unmatched() {
        let boosts = [in_stock(2.0)];
        assert_eq!(score(&boosts, &doc(json!({"stock": true})), 3.0).unwrap(), 6.0);
        assert_eq!(score(&boosts, &doc(json!({"stock": false})), 3.0).unwrap(), 3.0);
        assert_eq!(score(&boosts, &Document::new(), 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_add_is_additive() {
        let boosts = [
            in_stock(2.0),
            MetaBoost::Add(AddBoost {
                value: 0.5,
                boost: Box::new(in_stock(4.0)),
            }),
        ];
        // 3 × 2 + 0.5 × 4
        assert_eq!(score(&boosts, &doc(json!({"stock": true})), 3.0).unwrap(), 8.0);
        assert_eq!(score(&boosts, &doc(json!({"stock": false})), 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_interval_exact_at_points_and_clamped() {
        let b = interval(&[(0.0, 1.0), (10.0, 2.0), (20.0, 0.5)]);
        assert_eq!(interpolate(&b.points, 0.0), Some(1.0));
        assert_eq!(interpolate(&b.points, 10.0), Some(2.0));
        assert_eq!(interpolate(&b.points, 20.0), Some(0.5));
        assert_eq!(interpolate(&b.points, 5.0), Some(1.5));
        assert_eq!(interpolate(&b.points, -5.0), Some(1.0));
        assert_eq!(interpolate(&b.points, 99.0), Some(0.5));
        assert_eq!(interpolate(&[], 1.0), None);
    }

    #[test]
    fn test_interval_validation() {
        let too_few = MetaBoost::Interval(interval(&[(0.0, 1.0)]));
        match too_few.validate("meta_boosts[0]") {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "meta_boosts[0].interval.points")
            }
            other => panic!("unexpected {other:?}"),
        }
        let unsorted = MetaBoost::Interval(interval(&[(5.0, 1.0), (1.0, 2.0)]));
        assert!(unsorted.validate("b").is_err());
        let ok = MetaBoost::Interval(interval(&[(1.0, 1.0), (5.0, 2.0)]));
        assert!(ok.validate("b").is_ok());
    }

    #[test]
    fn test_geo_inside_and_outside() {
        let london = doc(json!({"lat": 51.5074, "lng": -0.1278}));
        let nyc = doc(json!({"lat": 40.7128, "lng": -74.0060}));
        let near_paris = |region| GeoBoost {
            value: 3.0,
            lat_field: "lat".into(),
            lng_field: "lng".into(),
            lat: 48.8566,
            lng: 2.3522,
            radius_km: 500.0,
            region,
        };
        let inside = MetaBoost::Geo(near_paris(GeoRegion::Inside));
        let outside = MetaBoost::Geo(near_paris(GeoRegion::Outside));
        assert_eq!(inside.effect(&london).unwrap(), Some(3.0));
        assert_eq!(inside.effect(&nyc).unwrap(), None);
        assert_eq!(outside.effect(&london).unwrap(), None);
        assert_eq!(outside.effect(&nyc).unwrap(), Some(3.0));
        assert_eq!(inside.effect(&Document::new()).unwrap(), None);
    }

    #[test]
    fn test_geo_rejects_bad_coordinates() {
        let b = MetaBoost::Geo(GeoBoost {
            value: 1.0,
            lat_field: "lat".into(),
            lng_field: "lng".into(),
            lat: 0.0,
            lng: 0.0,
            radius_km: 1.0,
            region: GeoRegion::Inside,
        });
        assert!(b.effect(&doc(json!({"lat": 123.0, "lng": 0.0}))).is_err());
        assert!(b.effect(&doc(json!({"lat": "north", "lng": 0.0}))).is_err());
    }

    #[test]
    fn test_distance_symmetric_and_monotonic() {
        let b = MetaBoost::Distance(DistanceBoost {
            value: 2.0,
            field: "year".into(),
            reference: 2000.0,
            min: 1990.0,
            max: 2010.0,
        });
        let at = |y: f64| b.effect(&doc(json!({ "year": y }))).unwrap();
        assert_eq!(at(2000.0), Some(2.0));
        assert_eq!(at(1995.0), at(2005.0));
        assert!(at(1995.0).unwrap() > at(1992.0).unwrap());
        assert_eq!(at(2010.0), Some(0.0));
        assert_eq!(at(2011.0), None);
    }

    #[test]
    fn test_distance_negative_value() {
        let b = MetaBoost::Distance(DistanceBoost {
            value: -1.0,
            field: "x".into(),
            reference: 0.0,
            min: -10.0,
            max: 10.0,
        });
        assert_eq!(b.effect(&doc(json!({"x": 5}))).unwrap(), Some(-0.5));
    }

    #[test]
    fn test_distance_validation() {
        let b = MetaBoost::Distance(DistanceBoost {
            value: 1.0,
            field: "x".into(),
            reference: 50.0,
            min: 0.0,
            max: 10.0,
        });
        assert!(b.validate("b").is_err());
    }

    #[test]
    fn test_element_overlap() {
        let b = MetaBoost::Element(ElementBoost {
            value: 1.0,
            field: "tags".into(),
            elements: vec!["rust".into(), "grpc".into(), "search".into(), "rust".into()],
        });
        let effect = b
            .effect(&doc(json!({"tags": ["search", "rust", "web"]})))
            .unwrap()
            .unwrap();
        assert!((effect - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.effect(&doc(json!({"tags": "rust"}))).unwrap(), Some(1.0 / 3.0));
        assert!(b.effect(&doc(json!({"tags": 7}))).is_err());
    }

    #[test]
    fn test_text_overlap() {
        let b = MetaBoost::Text(TextBoost {
            value: 1.0,
            field: "title".into(),
            text: "Fast red CAR".into(),
        });
        let effect = b
            .effect(&doc(json!({"title": "a red, fast bicycle"})))
            .unwrap()
            .unwrap();
        assert!((effect - 2.0 / 3.0).abs() < 1e-12);
        let empty_text = MetaBoost::Text(TextBoost {
            value: 1.0,
            field: "title".into(),
            text: " !! ".into(),
        });
        assert!(empty_text.validate("b").is_err());
    }

    #[test]
    fn test_nested_validation_path() {
        let b = MetaBoost::Add(AddBoost {
            value: 1.0,
            boost: Box::new(MetaBoost::Element(ElementBoost {
                value: 1.0,
                field: "tags".into(),
                elements: vec![],
            })),
        });
        match b.validate("meta_boosts[3]") {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "meta_boosts[3].add.boost.element.elements")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
