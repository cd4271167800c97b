use crate::matrix::MatrixParameters;

/// Tick positions in bin units, paired index-wise with their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSet {
    pub positions: Vec<f64>,
    pub labels: Vec<String>,
}

impl TickSet {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn distance_unit(upstream: f64) -> (f64, &'static str) {
    if upstream < 1e5 {
        (1e3, "Kb")
    } else {
        (1e6, "Mb")
    }
}

/// Ticks for the axis under each heatmap panel, in heatmap-pixel (bin)
/// coordinates.
///
/// Reference-point mode (`body == 0`) pins three ticks: the upstream edge,
/// the reference coordinate and the downstream edge. Scaled-region mode
/// labels the body start/end boundary pair, with the upstream/downstream
/// edge ticks present only when those flanks are non-zero.
pub fn heatmap_ticks(
    p: &MatrixParameters,
    reference_point_label: &str,
    start_label: &str,
    end_label: &str,
) -> TickSet {
    region_ticks(p, reference_point_label, start_label, end_label)
}

/// Ticks for the coordinate axis under the summary-profile panels. The
/// profile shares the bin coordinate system of the heatmap columns.
pub fn profile_ticks(
    p: &MatrixParameters,
    reference_point_label: &str,
    start_label: &str,
    end_label: &str,
) -> TickSet {
    region_ticks(p, reference_point_label, start_label, end_label)
}

fn region_ticks(
    p: &MatrixParameters,
    reference_point_label: &str,
    start_label: &str,
    end_label: &str,
) -> TickSet {
    let w = p.bin_size;
    let b = p.upstream;
    let a = p.downstream;
    let m = p.body;
    let (quotient, symbol) = distance_unit(b);

    if m == 0.0 {
        return TickSet {
            positions: vec![0.0, b / w, (b + a) / w],
            labels: vec![
                format!("{:.1}", -(b / quotient)),
                reference_point_label.to_string(),
                format!("{:.1}{}", a / quotient, symbol),
            ],
        };
    }

    let mut positions = vec![0.0];
    let mut labels = Vec::new();
    if b > 0.0 {
        positions.push(b / w);
        labels.push(format!("{:.1}", -(b / quotient)));
    }
    positions.push((b + m) / w);
    labels.push(start_label.to_string());
    labels.push(end_label.to_string());
    if a > 0.0 {
        positions.push((b + m + a) / w);
        labels.push(format!("{:.1}{}", a / quotient, symbol));
    }

    TickSet { positions, labels }
}
