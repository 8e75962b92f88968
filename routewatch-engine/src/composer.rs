//! Read-side projections of the store, one per dashboard tab.
//!
//! Composition never mutates the store and never fails: empty buffers
//! produce empty series and zero summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use routewatch_types::{DashboardSnapshot, Filter, MetricKey, MetricSample};
use serde::Serialize;

use crate::store::TimeSeriesStore;
use crate::EngineError;

/// Dashboard tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tab {
    #[default]
    Overview,
    Traffic,
    Performance,
    Convergence,
    Impairment,
    Shaping,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Overview,
        Tab::Traffic,
        Tab::Performance,
        Tab::Convergence,
        Tab::Impairment,
        Tab::Shaping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::Traffic => "traffic",
            Tab::Performance => "performance",
            Tab::Convergence => "convergence",
            Tab::Impairment => "impairment",
            Tab::Shaping => "shaping",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::Parse(format!("unknown tab {s:?}")))
    }
}

/// min/avg/max over a series. All zero when the series is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub latest: Option<f64>,
}

impl SeriesSummary {
    pub fn of(samples: &[MetricSample]) -> Self {
        let Some(last) = samples.last() else {
            return Self::default();
        };

        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), s| (min.min(s.value), max.max(s.value), sum + s.value),
        );

        Self {
            count: samples.len(),
            min,
            max,
            avg: sum / samples.len() as f64,
            latest: Some(last.value),
        }
    }
}

/// A metric plotted over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub key: MetricKey,
    pub points: Vec<MetricSample>,
    pub summary: SeriesSummary,
}

impl LineSeries {
    fn read(store: &TimeSeriesStore, key: MetricKey) -> Self {
        let points = store.read(&key);
        let summary = SeriesSummary::of(&points);
        Self {
            key,
            points,
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewModel {
    pub snapshot: DashboardSnapshot,
    pub total_routers: f64,
    pub active_connections: f64,
    pub average_latency: f64,
    pub latest_bandwidth: f64,
    pub latest_latency: f64,
    pub latest_packet_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficModel {
    pub bandwidth: LineSeries,
    pub throughput: LineSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceModel {
    pub latency: LineSeries,
    pub packet_loss: LineSeries,
}

/// One protocol's share of total convergence time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceSlice {
    pub protocol: &'static str,
    pub key: MetricKey,
    pub value: f64,
    /// Fraction of `total`, in `0.0..=1.0`.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceModel {
    pub slices: Vec<ConvergenceSlice>,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub timestamp: i64,
    pub impact: f64,
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpairmentModel {
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapingModel {
    pub bars: Vec<Bar>,
    pub summary: SeriesSummary,
}

/// The model of one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tab", content = "model", rename_all = "camelCase")]
pub enum TabView {
    Overview(OverviewModel),
    Traffic(TrafficModel),
    Performance(PerformanceModel),
    Convergence(ConvergenceModel),
    Impairment(ImpairmentModel),
    Shaping(ShapingModel),
}

impl TabView {
    pub fn tab(&self) -> Tab {
        match self {
            TabView::Overview(_) => Tab::Overview,
            TabView::Traffic(_) => Tab::Traffic,
            TabView::Performance(_) => Tab::Performance,
            TabView::Convergence(_) => Tab::Convergence,
            TabView::Impairment(_) => Tab::Impairment,
            TabView::Shaping(_) => Tab::Shaping,
        }
    }
}

/// A composed tab together with the filter it was composed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderModel {
    pub filter: Filter,
    #[serde(flatten)]
    pub view: TabView,
}

/// Builds tab models from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardComposer;

impl DashboardComposer {
    pub fn compose(store: &TimeSeriesStore, filter: &Filter, tab: Tab) -> RenderModel {
        let view = match tab {
            Tab::Overview => TabView::Overview(Self::overview(store)),
            Tab::Traffic => TabView::Traffic(Self::traffic(store)),
            Tab::Performance => TabView::Performance(Self::performance(store)),
            Tab::Convergence => TabView::Convergence(Self::convergence(store)),
            Tab::Impairment => TabView::Impairment(Self::impairment(store)),
            Tab::Shaping => TabView::Shaping(Self::shaping(store)),
        };
        RenderModel {
            filter: filter.clone(),
            view,
        }
    }

    pub fn overview(store: &TimeSeriesStore) -> OverviewModel {
        let latest = |key: &MetricKey| store.latest(key).map_or(0.0, |s| s.value);
        let snapshot = store.snapshot();

        OverviewModel {
            total_routers: snapshot.get_or_zero(DashboardSnapshot::TOTAL_ROUTERS),
            active_connections: snapshot.get_or_zero(DashboardSnapshot::ACTIVE_CONNECTIONS),
            average_latency: snapshot.get_or_zero(DashboardSnapshot::AVERAGE_LATENCY),
            latest_bandwidth: latest(&MetricKey::Bandwidth),
            latest_latency: latest(&MetricKey::Latency),
            latest_packet_loss: latest(&MetricKey::PacketLoss),
            snapshot,
        }
    }

    pub fn traffic(store: &TimeSeriesStore) -> TrafficModel {
        TrafficModel {
            bandwidth: LineSeries::read(store, MetricKey::Bandwidth),
            throughput: LineSeries::read(store, MetricKey::Throughput),
        }
    }

    pub fn performance(store: &TimeSeriesStore) -> PerformanceModel {
        PerformanceModel {
            latency: LineSeries::read(store, MetricKey::Latency),
            packet_loss: LineSeries::read(store, MetricKey::PacketLoss),
        }
    }

    /// Latest value of each convergence series that has data.
    pub fn convergence(store: &TimeSeriesStore) -> ConvergenceModel {
        let latest: Vec<(MetricKey, f64)> = MetricKey::CONVERGENCE
            .into_iter()
            .filter_map(|key| store.latest(&key).map(|s| (key, s.value)))
            .collect();
        let total: f64 = latest.iter().map(|(_, v)| v).sum();

        let slices = latest
            .into_iter()
            .map(|(key, value)| ConvergenceSlice {
                protocol: key.protocol_label().unwrap_or("?"),
                share: if total > 0.0 { value / total } else { 0.0 },
                key,
                value,
            })
            .collect();

        ConvergenceModel { slices, total }
    }

    /// netem impact against latency, joined on timestamp.
    pub fn impairment(store: &TimeSeriesStore) -> ImpairmentModel {
        let latency: BTreeMap<i64, f64> = store
            .read(&MetricKey::Latency)
            .into_iter()
            .map(|s| (s.timestamp, s.value))
            .collect();

        let points = store
            .read(&MetricKey::NetemImpact)
            .into_iter()
            .filter_map(|s| {
                latency.get(&s.timestamp).map(|&latency| ScatterPoint {
                    timestamp: s.timestamp,
                    impact: s.value,
                    latency,
                })
            })
            .collect();

        ImpairmentModel { points }
    }

    pub fn shaping(store: &TimeSeriesStore) -> ShapingModel {
        let samples = store.read(&MetricKey::TrafficShapingEffectiveness);
        ShapingModel {
            summary: SeriesSummary::of(&samples),
            bars: samples
                .into_iter()
                .map(|s| Bar {
                    timestamp: s.timestamp,
                    value: s.value,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewatch_types::{AnalyticsDomain, TimeRange};

    fn store_with(key: MetricKey, values: &[(i64, f64)]) -> TimeSeriesStore {
        let store = TimeSeriesStore::new(100);
        store.reset(&key, values.iter().copied().map(MetricSample::from).collect());
        store
    }

    #[test]
    fn test_empty_store_composes_zero_models() {
        let store = TimeSeriesStore::new(100);
        for tab in Tab::ALL {
            let model = DashboardComposer::compose(&store, &Filter::default(), tab);
            assert_eq!(model.view.tab(), tab);
        }

        let overview = DashboardComposer::overview(&store);
        assert_eq!(overview.latest_bandwidth, 0.0);
        assert_eq!(overview.total_routers, 0.0);

        let traffic = DashboardComposer::traffic(&store);
        assert!(traffic.bandwidth.points.is_empty());
        assert_eq!(traffic.bandwidth.summary, SeriesSummary::default());

        let convergence = DashboardComposer::convergence(&store);
        assert!(convergence.slices.is_empty());
        assert_eq!(convergence.total, 0.0);
    }

    #[test]
    fn test_summary_statistics() {
        let store = store_with(MetricKey::Latency, &[(1, 4.0), (2, 8.0), (3, 6.0)]);
        let performance = DashboardComposer::performance(&store);
        let summary = performance.latency.summary;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 4.0);
        assert_eq!(summary.max, 8.0);
        assert_eq!(summary.avg, 6.0);
        assert_eq!(summary.latest, Some(6.0));
    }

    #[test]
    fn test_overview_reads_snapshot_and_latest_values() {
        let store = store_with(MetricKey::Bandwidth, &[(1, 100.0), (2, 250.0)]);
        store.replace_aggregate(
            AnalyticsDomain::Routing,
            BTreeMap::from([("totalRouters".to_string(), 9.0)]),
            1,
        );

        let overview = DashboardComposer::overview(&store);
        assert_eq!(overview.total_routers, 9.0);
        assert_eq!(overview.latest_bandwidth, 250.0);
        assert_eq!(overview.snapshot.generation, 1);
    }

    #[test]
    fn test_convergence_shares() {
        let store = TimeSeriesStore::new(100);
        store.append(&MetricKey::BgpConvergence, MetricSample::new(1, 30.0));
        store.append(&MetricKey::OspfConvergence, MetricSample::new(1, 10.0));

        let model = DashboardComposer::convergence(&store);
        assert_eq!(model.total, 40.0);
        assert_eq!(model.slices.len(), 2);
        assert_eq!(model.slices[0].protocol, "BGP");
        assert_eq!(model.slices[0].share, 0.75);
        assert_eq!(model.slices[1].protocol, "OSPF");
        assert_eq!(model.slices[1].share, 0.25);
    }

    #[test]
    fn test_impairment_joins_on_timestamp() {
        let store = store_with(MetricKey::NetemImpact, &[(1, 0.2), (2, 0.5), (3, 0.9)]);
        store.reset(
            &MetricKey::Latency,
            vec![MetricSample::new(1, 10.0), MetricSample::new(3, 40.0)],
        );

        let model = DashboardComposer::impairment(&store);
        assert_eq!(
            model.points,
            vec![
                ScatterPoint { timestamp: 1, impact: 0.2, latency: 10.0 },
                ScatterPoint { timestamp: 3, impact: 0.9, latency: 40.0 },
            ]
        );
    }

    #[test]
    fn test_compose_does_not_mutate_store() {
        let store = TimeSeriesStore::new(100);
        for tab in Tab::ALL {
            DashboardComposer::compose(&store, &Filter::default(), tab);
        }
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_render_model_json_shape() {
        let store = store_with(MetricKey::TrafficShapingEffectiveness, &[(5, 0.8)]);
        let filter = Filter::new(TimeRange::LastWeek, "edge-1");
        let model = DashboardComposer::compose(&store, &filter, Tab::Shaping);

        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["tab"], "shaping");
        assert_eq!(json["filter"]["timeRange"], "7d");
        assert_eq!(json["filter"]["routerId"], "edge-1");
        assert_eq!(json["model"]["bars"][0]["value"], 0.8);
    }

    #[test]
    fn test_tab_parsing() {
        assert_eq!("Traffic".parse::<Tab>().unwrap(), Tab::Traffic);
        assert!("alerts".parse::<Tab>().is_err());
    }
}
