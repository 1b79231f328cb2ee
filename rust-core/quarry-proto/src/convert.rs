// SPDX-License-Identifier: PMPL-1.0-or-later
//! Wire ↔ model conversions.

use std::collections::BTreeMap;

use quarry_document::KeyMeta;
use quarry_query::{
    AddBoost, Aggregate, AggregateResponse, BucketCount, CombinatorOperator, DistanceBoost,
    Document, ElementBoost, FieldOperator, Filter, FilterBoost, GeoBoost, GeoRegion, IndexBoost,
    IntervalBoost, IntervalPoint, Key, MetaBoost, MetricKind, MetricResult, QueryError, Request,
    Response, Result, SearchResult, Sort, SortOrder, Term, TextQuery,
};
use serde_json::Value;

use crate::proto;

fn invalid(path: impl Into<String>, reason: impl Into<String>) -> QueryError {
    QueryError::validation(path, reason)
}

fn unknown_enum(path: &str, raw: i32) -> QueryError {
    invalid(path, format!("unknown enum value {raw}"))
}

fn decode_json(path: &str, raw: &[u8]) -> Result<Value> {
    if raw.is_empty() {
        return Err(invalid(path, "value is empty"));
    }
    serde_json::from_slice(raw).map_err(|e| invalid(path, format!("value is not valid JSON: {e}")))
}

fn encode_json(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Recursive fields may be generated boxed; accept either shape.
fn unbox<T>(b: impl Into<Box<T>>) -> T {
    *b.into()
}

// ---------------------------------------------------------------- enums

fn field_operator(raw: i32, path: &str) -> Result<FieldOperator> {
    use proto::field::Operator as P;
    let op = P::try_from(raw).map_err(|_| unknown_enum(path, raw))?;
    Ok(match op {
        P::EqualTo => FieldOperator::EqualTo,
        P::DoesNotEqual => FieldOperator::DoesNotEqual,
        P::GreaterThan => FieldOperator::GreaterThan,
        P::GreaterThanOrEqualTo => FieldOperator::GreaterThanOrEqualTo,
        P::LessThan => FieldOperator::LessThan,
        P::LessThanOrEqualTo => FieldOperator::LessThanOrEqualTo,
        P::Contains => FieldOperator::Contains,
        P::DoesNotContain => FieldOperator::DoesNotContain,
        P::EndsWith => FieldOperator::EndsWith,
        P::StartsWith => FieldOperator::StartsWith,
    })
}

fn field_operator_wire(op: FieldOperator) -> i32 {
    use proto::field::Operator as P;
    let p = match op {
        FieldOperator::EqualTo => P::EqualTo,
        FieldOperator::DoesNotEqual => P::DoesNotEqual,
        FieldOperator::GreaterThan => P::GreaterThan,
        FieldOperator::GreaterThanOrEqualTo => P::GreaterThanOrEqualTo,
        FieldOperator::LessThan => P::LessThan,
        FieldOperator::LessThanOrEqualTo => P::LessThanOrEqualTo,
        FieldOperator::Contains => P::Contains,
        FieldOperator::DoesNotContain => P::DoesNotContain,
        FieldOperator::EndsWith => P::EndsWith,
        FieldOperator::StartsWith => P::StartsWith,
    };
    p as i32
}

fn combinator_operator(raw: i32, path: &str) -> Result<CombinatorOperator> {
    use proto::combinator::Operator as P;
    let op = P::try_from(raw).map_err(|_| unknown_enum(path, raw))?;
    Ok(match op {
        P::All => CombinatorOperator::All,
        P::Any => CombinatorOperator::Any,
        P::One => CombinatorOperator::One,
        P::None => CombinatorOperator::None,
    })
}

fn combinator_operator_wire(op: CombinatorOperator) -> i32 {
    use proto::combinator::Operator as P;
    let p = match op {
        CombinatorOperator::All => P::All,
        CombinatorOperator::Any => P::Any,
        CombinatorOperator::One => P::One,
        CombinatorOperator::None => P::None,
    };
    p as i32
}

fn geo_region(raw: i32, path: &str) -> Result<GeoRegion> {
    use proto::meta_boost::geo::Region as P;
    match P::try_from(raw).map_err(|_| unknown_enum(path, raw))? {
        P::Inside => Ok(GeoRegion::Inside),
        P::Outside => Ok(GeoRegion::Outside),
    }
}

fn geo_region_wire(region: GeoRegion) -> i32 {
    use proto::meta_boost::geo::Region as P;
    match region {
        GeoRegion::Inside => P::Inside as i32,
        GeoRegion::Outside => P::Outside as i32,
    }
}

fn sort_order(raw: i32, path: &str) -> Result<SortOrder> {
    use proto::sort::Order as P;
    match P::try_from(raw).map_err(|_| unknown_enum(path, raw))? {
        P::Asc => Ok(SortOrder::Asc),
        P::Desc => Ok(SortOrder::Desc),
    }
}

fn sort_order_wire(order: SortOrder) -> i32 {
    use proto::sort::Order as P;
    match order {
        SortOrder::Asc => P::Asc as i32,
        SortOrder::Desc => P::Desc as i32,
    }
}

fn metric_kind(raw: i32, path: &str) -> Result<MetricKind> {
    use proto::aggregate::metric::Type as P;
    Ok(match P::try_from(raw).map_err(|_| unknown_enum(path, raw))? {
        P::Avg => MetricKind::Avg,
        P::Min => MetricKind::Min,
        P::Max => MetricKind::Max,
        P::Sum => MetricKind::Sum,
    })
}

fn metric_kind_wire(kind: MetricKind) -> i32 {
    use proto::aggregate::metric::Type as P;
    let p = match kind {
        MetricKind::Avg => P::Avg,
        MetricKind::Min => P::Min,
        MetricKind::Max => P::Max,
        MetricKind::Sum => P::Sum,
    };
    p as i32
}

// ---------------------------------------------------------------- filters

fn filter_from(p: proto::Filter, path: &str) -> Result<Filter> {
    use proto::filter::Value as V;
    match p.value {
        Some(V::Field(f)) => {
            let operator = field_operator(f.operator, &format!("{path}.operator"))?;
            let value = decode_json(&format!("{path}.value"), &f.value)?;
            Ok(Filter::field(operator, f.field, value))
        }
        Some(V::Combinator(c)) => {
            let operator = combinator_operator(c.operator, &format!("{path}.operator"))?;
            let filters = c
                .filters
                .into_iter()
                .enumerate()
                .map(|(i, child)| filter_from(child, &format!("{path}.filters[{i}]")))
                .collect::<Result<Vec<_>>>()?;
            Ok(Filter::combine(operator, filters))
        }
        None => Err(invalid(path, "filter has neither a field nor a combinator")),
    }
}

impl TryFrom<proto::Filter> for Filter {
    type Error = QueryError;

    fn try_from(p: proto::Filter) -> Result<Self> {
        filter_from(p, "filter")
    }
}

impl From<Filter> for proto::Filter {
    fn from(filter: Filter) -> Self {
        use proto::filter::Value as V;
        let value = match filter {
            Filter::Field(f) => V::Field(proto::Field {
                operator: field_operator_wire(f.operator),
                field: f.field,
                value: encode_json(&f.value),
            }),
            Filter::Combinator(c) => V::Combinator(proto::Combinator {
                operator: combinator_operator_wire(c.operator),
                filters: c.filters.into_iter().map(Into::into).collect(),
            }),
        };
        proto::Filter { value: Some(value) }
    }
}

fn required_filter(filter: Option<proto::Filter>, path: &str) -> Result<Filter> {
    let filter = filter.ok_or_else(|| invalid(path, "filter is missing"))?;
    filter_from(filter, path)
}

// ---------------------------------------------------------------- boosts

fn boost_from(p: proto::MetaBoost, path: &str) -> Result<MetaBoost> {
    use proto::meta_boost::Value as V;
    let value = p.value.ok_or_else(|| invalid(path, "meta boost has no value"))?;
    Ok(match value {
        V::Add(add) => {
            let add: proto::meta_boost::Add = unbox(add);
            let inner_path = format!("{path}.add.boost");
            let inner = add
                .boost
                .ok_or_else(|| invalid(inner_path.as_str(), "nested boost is missing"))?;
            MetaBoost::Add(AddBoost {
                value: add.value,
                boost: Box::new(boost_from(unbox(inner), &inner_path)?),
            })
        }
        V::Filter(b) => MetaBoost::Filter(FilterBoost {
            value: b.value,
            filter: required_filter(b.filter, &format!("{path}.filter.filter"))?,
        }),
        V::Geo(b) => MetaBoost::Geo(GeoBoost {
            value: b.value,
            region: geo_region(b.region, &format!("{path}.geo.region"))?,
            lat_field: b.lat_field,
            lng_field: b.lng_field,
            lat: b.lat,
            lng: b.lng,
            radius_km: b.radius,
        }),
        V::Interval(b) => MetaBoost::Interval(IntervalBoost {
            field: b.field,
            points: b
                .points
                .into_iter()
                .map(|p| IntervalPoint {
                    point: p.point,
                    value: p.value,
                })
                .collect(),
        }),
        V::Distance(b) => MetaBoost::Distance(DistanceBoost {
            value: b.value,
            field: b.field,
            reference: b.r#ref,
            min: b.min,
            max: b.max,
        }),
        V::Element(b) => MetaBoost::Element(ElementBoost {
            value: b.value,
            field: b.field,
            elements: b.elements,
        }),
        V::Text(b) => MetaBoost::Text(quarry_query::TextBoost {
            value: b.value,
            field: b.field,
            text: b.text,
        }),
    })
}

impl TryFrom<proto::MetaBoost> for MetaBoost {
    type Error = QueryError;

    fn try_from(p: proto::MetaBoost) -> Result<Self> {
        boost_from(p, "meta_boost")
    }
}

impl From<MetaBoost> for proto::MetaBoost {
    fn from(boost: MetaBoost) -> Self {
        use proto::meta_boost as mb;
        let value = match boost {
            MetaBoost::Add(b) => mb::Value::Add(
                mb::Add {
                    value: b.value,
                    boost: Some(proto::MetaBoost::from(*b.boost).into()),
                }
                .into(),
            ),
            MetaBoost::Filter(b) => mb::Value::Filter(mb::Filter {
                value: b.value,
                filter: Some(b.filter.into()),
            }),
            MetaBoost::Geo(b) => mb::Value::Geo(mb::Geo {
                value: b.value,
                lat_field: b.lat_field,
                lng_field: b.lng_field,
                lat: b.lat,
                lng: b.lng,
                radius: b.radius_km,
                region: geo_region_wire(b.region),
            }),
            MetaBoost::Interval(b) => mb::Value::Interval(mb::Interval {
                field: b.field,
                points: b
                    .points
                    .into_iter()
                    .map(|p| mb::interval::Point {
                        point: p.point,
                        value: p.value,
                    })
                    .collect(),
            }),
            MetaBoost::Distance(b) => mb::Value::Distance(mb::Distance {
                value: b.value,
                field: b.field,
                r#ref: b.reference,
                min: b.min,
                max: b.max,
            }),
            MetaBoost::Element(b) => mb::Value::Element(mb::Element {
                value: b.value,
                field: b.field,
                elements: b.elements,
            }),
            MetaBoost::Text(b) => mb::Value::Text(mb::Text {
                value: b.value,
                field: b.field,
                text: b.text,
            }),
        };
        proto::MetaBoost { value: Some(value) }
    }
}

fn index_boost_from(p: proto::IndexBoost, path: &str) -> Result<IndexBoost> {
    use proto::index_boost::Value as V;
    match p.value {
        Some(V::Origin(o)) => Ok(IndexBoost::Origin {
            field: o.field,
            value: o.value,
        }),
        Some(V::Interaction(i)) => Ok(IndexBoost::Interaction { pos: i.pos, neg: i.neg }),
        None => Err(invalid(path, "index boost has neither origin nor interaction")),
    }
}

impl From<IndexBoost> for proto::IndexBoost {
    fn from(boost: IndexBoost) -> Self {
        use proto::index_boost::{Interaction, Origin, Value as V};
        let value = match boost {
            IndexBoost::Origin { field, value } => V::Origin(Origin { field, value }),
            IndexBoost::Interaction { pos, neg } => V::Interaction(Interaction { pos, neg }),
        };
        proto::IndexBoost { value: Some(value) }
    }
}

// ---------------------------------------------------------------- terms, sort

fn counter(raw: u32, path: String) -> Result<u16> {
    u16::try_from(raw).map_err(|_| invalid(path, format!("{raw} exceeds {}", u16::MAX)))
}

fn term_from(t: proto::Term, path: &str) -> Result<Term> {
    Ok(Term {
        pos: counter(t.pos, format!("{path}.pos"))?,
        neg: counter(t.neg, format!("{path}.neg"))?,
        value: t.value,
        field: t.field,
        // 0 is the proto3 default, so it reads as unset
        potency: if t.potency == 0.0 { 1.0 } else { t.potency },
        word_offset: t.word_offset,
        para_offset: t.para_offset,
    })
}

impl From<Term> for proto::Term {
    fn from(t: Term) -> Self {
        proto::Term {
            value: t.value,
            field: t.field,
            pos: u32::from(t.pos),
            neg: u32::from(t.neg),
            potency: t.potency,
            word_offset: t.word_offset,
            para_offset: t.para_offset,
        }
    }
}

impl From<Sort> for proto::Sort {
    fn from(s: Sort) -> Self {
        proto::Sort {
            field: s.field,
            order: sort_order_wire(s.order),
        }
    }
}

// ---------------------------------------------------------------- aggregates

fn aggregate_from(p: proto::Aggregate, path: &str) -> Result<Aggregate> {
    use proto::aggregate::Value as V;
    match p.value {
        Some(V::Metric(m)) => Ok(Aggregate::metric(m.field, metric_kind(m.r#type, &format!("{path}.type"))?)),
        Some(V::Count(c)) => Ok(Aggregate::count(c.field)),
        Some(V::Bucket(b)) => {
            let buckets = b
                .buckets
                .into_iter()
                .enumerate()
                .map(|(i, e)| {
                    let filter = required_filter(e.filter, &format!("{path}.buckets[{i}].filter"))?;
                    Ok((e.name, filter))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Aggregate::bucket(buckets))
        }
        None => Err(invalid(path, "aggregate has no metric, count or bucket")),
    }
}

impl From<Aggregate> for proto::Aggregate {
    fn from(agg: Aggregate) -> Self {
        use proto::aggregate as pa;
        let value = match agg {
            Aggregate::Metric(m) => pa::Value::Metric(pa::Metric {
                field: m.field,
                r#type: metric_kind_wire(m.kind),
            }),
            Aggregate::Count(c) => pa::Value::Count(pa::Count { field: c.field }),
            Aggregate::Bucket(b) => pa::Value::Bucket(pa::Bucket {
                buckets: b
                    .buckets
                    .into_iter()
                    .map(|nf| pa::bucket::Entry {
                        name: nf.name,
                        filter: Some(nf.filter.into()),
                    })
                    .collect(),
            }),
        };
        proto::Aggregate { value: Some(value) }
    }
}

fn aggregate_response_from(p: proto::AggregateResponse, path: &str) -> Result<AggregateResponse> {
    use proto::aggregate_response::Value as V;
    match p.value {
        Some(V::Metric(m)) => Ok(AggregateResponse::Metric(MetricResult { value: m.value })),
        Some(V::Count(c)) => Ok(AggregateResponse::Count(c.counts.into_iter().collect())),
        Some(V::Bucket(b)) => Ok(AggregateResponse::Bucket(
            b.buckets
                .into_iter()
                .map(|(key, e)| {
                    (
                        key,
                        BucketCount {
                            name: e.name,
                            count: e.count,
                        },
                    )
                })
                .collect(),
        )),
        None => Err(invalid(path, "aggregate response has no value")),
    }
}

impl From<AggregateResponse> for proto::AggregateResponse {
    fn from(resp: AggregateResponse) -> Self {
        use proto::aggregate_response as pr;
        let value = match resp {
            AggregateResponse::Metric(m) => pr::Value::Metric(pr::Metric { value: m.value }),
            AggregateResponse::Count(c) => pr::Value::Count(pr::Count {
                counts: c.into_iter().collect(),
            }),
            AggregateResponse::Bucket(b) => pr::Value::Bucket(pr::Bucket {
                buckets: b
                    .into_iter()
                    .map(|(key, e)| {
                        (
                            key,
                            pr::bucket::Entry {
                                name: e.name,
                                count: e.count,
                            },
                        )
                    })
                    .collect(),
            }),
        };
        proto::AggregateResponse { value: Some(value) }
    }
}

// ---------------------------------------------------------------- request

impl TryFrom<proto::Request> for Request {
    type Error = QueryError;

    fn try_from(p: proto::Request) -> Result<Self> {
        let query = p.query.map(|q| match q {
            proto::request::Query::Body(body) => TextQuery::Body(body),
            proto::request::Query::WeightedBody(w) => TextQuery::WeightedBody(w.words.into_iter().collect()),
        });

        let terms = p
            .terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| term_from(t, &format!("terms[{i}]")))
            .collect::<Result<Vec<_>>>()?;

        let filter = p.filter.map(|f| filter_from(f, "filter")).transpose()?;

        let meta_boosts = p
            .meta_boosts
            .into_iter()
            .enumerate()
            .map(|(i, b)| boost_from(b, &format!("meta_boosts[{i}]")))
            .collect::<Result<Vec<_>>>()?;

        let index_boosts = p
            .index_boosts
            .into_iter()
            .enumerate()
            .map(|(i, b)| index_boost_from(b, &format!("index_boosts[{i}]")))
            .collect::<Result<Vec<_>>>()?;

        let sort = p
            .sort
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                Ok(Sort {
                    order: sort_order(s.order, &format!("sort[{i}].order"))?,
                    field: s.field,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let aggregates: BTreeMap<String, Aggregate> = p
            .aggregates
            .into_iter()
            .map(|(name, agg)| {
                let agg = aggregate_from(agg, &format!("aggregates[{name:?}]"))?;
                Ok((name, agg))
            })
            .collect::<Result<_>>()?;

        Ok(Request {
            query,
            terms,
            filter,
            meta_boosts,
            index_boosts,
            page: p.page,
            max_results: p.max_results,
            fields: p.fields,
            sort,
            aggregates,
        })
    }
}

impl From<Request> for proto::Request {
    fn from(r: Request) -> Self {
        let query = r.query.map(|q| match q {
            TextQuery::Body(body) => proto::request::Query::Body(body),
            TextQuery::WeightedBody(words) => proto::request::Query::WeightedBody(proto::WeightedBody {
                words: words.into_iter().collect(),
            }),
        });
        proto::Request {
            query,
            terms: r.terms.into_iter().map(Into::into).collect(),
            filter: r.filter.map(Into::into),
            meta_boosts: r.meta_boosts.into_iter().map(Into::into).collect(),
            index_boosts: r.index_boosts.into_iter().map(Into::into).collect(),
            page: r.page,
            max_results: r.max_results,
            fields: r.fields,
            sort: r.sort.into_iter().map(Into::into).collect(),
            aggregates: r.aggregates.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

// ---------------------------------------------------------------- response

impl From<SearchResult> for proto::SearchResult {
    fn from(r: SearchResult) -> Self {
        proto::SearchResult {
            meta: r.meta,
            score: r.score,
            raw_score: r.raw_score,
        }
    }
}

impl From<proto::SearchResult> for SearchResult {
    fn from(r: proto::SearchResult) -> Self {
        SearchResult {
            meta: r.meta,
            score: r.score,
            raw_score: r.raw_score,
        }
    }
}

impl From<Response> for proto::Response {
    fn from(r: Response) -> Self {
        proto::Response {
            reads: r.reads,
            total_results: r.total_results,
            time: r.time,
            aggregates: r.aggregates.into_iter().map(|(k, v)| (k, v.into())).collect(),
            results: r.results.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<proto::Response> for Response {
    type Error = QueryError;

    fn try_from(r: proto::Response) -> Result<Self> {
        let aggregates: BTreeMap<String, AggregateResponse> = r
            .aggregates
            .into_iter()
            .map(|(name, agg)| {
                let agg = aggregate_response_from(agg, &format!("aggregates[{name:?}]"))?;
                Ok((name, agg))
            })
            .collect::<Result<_>>()?;
        Ok(Response {
            reads: r.reads,
            total_results: r.total_results,
            time: r.time,
            aggregates,
            results: r.results.into_iter().map(Into::into).collect(),
        })
    }
}

// ---------------------------------------------------------------- documents

impl From<proto::DocumentMeta> for Document {
    fn from(d: proto::DocumentMeta) -> Self {
        Document { meta: d.meta }
    }
}

impl From<Document> for proto::DocumentMeta {
    fn from(d: Document) -> Self {
        proto::DocumentMeta { meta: d.meta }
    }
}

impl From<proto::Key> for Key {
    fn from(k: proto::Key) -> Self {
        Key {
            field: k.field,
            value: k.value,
        }
    }
}

impl From<Key> for proto::Key {
    fn from(k: Key) -> Self {
        proto::Key {
            field: k.field,
            value: k.value,
        }
    }
}

impl TryFrom<proto::KeyMeta> for KeyMeta {
    type Error = QueryError;

    fn try_from(k: proto::KeyMeta) -> Result<Self> {
        let key = k.key.ok_or_else(|| invalid("key", "key is missing"))?;
        Ok(KeyMeta {
            key: key.into(),
            meta: k.meta,
        })
    }
}

impl From<KeyMeta> for proto::KeyMeta {
    fn from(k: KeyMeta) -> Self {
        proto::KeyMeta {
            key: Some(k.key.into()),
            meta: k.meta,
        }
    }
}

/// Decode the entries of a `Patch` call, naming the offending entry on error.
pub fn key_metas(entries: Vec<proto::KeyMeta>) -> Result<Vec<KeyMeta>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let key = entry
                .key
                .ok_or_else(|| invalid(format!("keys_metas[{i}].key"), "key is missing"))?;
            Ok(KeyMeta {
                key: key.into(),
                meta: entry.meta,
            })
        })
        .collect()
}

/// Decode documents carried by an `Evaluate` or `Compare` call.
pub fn required_document(doc: Option<proto::DocumentMeta>, path: &str) -> Result<Document> {
    doc.map(Into::into)
        .ok_or_else(|| invalid(path, "document is missing"))
}
