use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use log::warn;
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::Deserialize;

use crate::cluster::{self, ClusterMethod};
use crate::error::HeatplotError;

/// How regions are ordered inside each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortMethod {
    No,
    Ascend,
    Descend,
}

/// The statistic regions are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortCriterion {
    Mean,
    Median,
    Max,
    Min,
    Sum,
    #[value(alias = "region_length")]
    RegionLength,
}

/// Region-model parameters shared by every region in the matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixParameters {
    pub upstream: f64,
    pub downstream: f64,
    pub body: f64,
    pub bin_size: f64,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub score: String,
    pub strand: String,
}

/// One (group, sample) submatrix together with its labels.
pub struct Submatrix<'a> {
    pub matrix: ArrayView2<'a, f64>,
    pub group_label: &'a str,
    pub sample_label: &'a str,
}

/// JSON header line of the matrix file (prefixed with '@').
#[derive(Debug, Deserialize)]
struct MatrixHeader {
    #[serde(default)]
    upstream: f64,
    #[serde(default)]
    downstream: f64,
    #[serde(default)]
    body: f64,
    #[serde(rename = "bin size")]
    bin_size: f64,
    #[serde(default)]
    sample_labels: Vec<String>,
    #[serde(default)]
    sample_boundaries: Vec<usize>,
    #[serde(default)]
    group_labels: Vec<String>,
    #[serde(default)]
    group_boundaries: Vec<usize>,
    #[serde(rename = "sort regions", default)]
    sort_regions: Option<String>,
    #[serde(rename = "sort using", default)]
    sort_using: Option<String>,
}

/// The full signal matrix: group -> sample -> (regions x bins), stored as a
/// single 2D array carved up by cumulative group/sample boundaries.
#[derive(Debug, Clone)]
pub struct SignalMatrix {
    values: Array2<f64>,
    regions: Vec<Region>,
    group_boundaries: Vec<usize>,
    sample_boundaries: Vec<usize>,
    group_labels: Vec<String>,
    sample_labels: Vec<String>,
    pub parameters: MatrixParameters,
    sort_method: SortMethod,
    sort_criterion: SortCriterion,
}

impl SignalMatrix {
    /// Read a gzipped matrix file: one '@'-prefixed JSON header line, then
    /// one TSV row per region (chrom start end name score strand v1..vN).
    pub fn from_file(path: &Path) -> Result<SignalMatrix, HeatplotError> {
        let mut raw = Vec::new();
        File::open(path)?.read_to_end(&mut raw)?;

        let mut text = String::new();
        if raw.starts_with(&[0x1f, 0x8b]) {
            GzDecoder::new(raw.as_slice()).read_to_string(&mut text)?;
        } else {
            text = String::from_utf8(raw)
                .map_err(|_| HeatplotError::MatrixFormat("matrix file is not UTF-8".into()))?;
        }

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| HeatplotError::MatrixFormat("empty matrix file".into()))?;
        let header_json = header_line.strip_prefix('@').ok_or_else(|| {
            HeatplotError::MatrixFormat("missing '@' header line".into())
        })?;
        let header: MatrixHeader = serde_json::from_str(header_json)
            .map_err(|e| HeatplotError::MatrixFormat(format!("bad header: {}", e)))?;

        let mut regions = Vec::new();
        let mut flat = Vec::new();
        let mut ncols = None;
        for (lineno, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return Err(HeatplotError::MatrixFormat(format!(
                    "row {}: expected 6 region fields plus scores",
                    lineno + 2
                )));
            }
            let start = fields[1].parse::<u64>().map_err(|_| {
                HeatplotError::MatrixFormat(format!("row {}: bad start", lineno + 2))
            })?;
            let end = fields[2].parse::<u64>().map_err(|_| {
                HeatplotError::MatrixFormat(format!("row {}: bad end", lineno + 2))
            })?;
            regions.push(Region {
                chrom: fields[0].to_string(),
                start,
                end,
                name: fields[3].to_string(),
                score: fields[4].to_string(),
                strand: fields[5].to_string(),
            });
            let values = &fields[6..];
            match ncols {
                None => ncols = Some(values.len()),
                Some(n) if n != values.len() => {
                    return Err(HeatplotError::MatrixFormat(format!(
                        "row {}: expected {} scores, found {}",
                        lineno + 2,
                        n,
                        values.len()
                    )));
                }
                _ => {}
            }
            for v in values {
                flat.push(parse_score(v));
            }
        }

        let nrows = regions.len();
        let ncols = ncols.unwrap_or(0);
        let values = Array2::from_shape_vec((nrows, ncols), flat)
            .map_err(|e| HeatplotError::MatrixFormat(e.to_string()))?;

        let sample_boundaries = if header.sample_boundaries.is_empty() {
            vec![0, ncols]
        } else {
            header.sample_boundaries
        };
        let group_boundaries = if header.group_boundaries.is_empty() {
            vec![0, nrows]
        } else {
            header.group_boundaries
        };
        let sample_labels = if header.sample_labels.is_empty() {
            default_labels(sample_boundaries.len() - 1, "sample")
        } else {
            header.sample_labels
        };
        let group_labels = if header.group_labels.is_empty() {
            if group_boundaries.len() == 2 {
                vec!["genes".to_string()]
            } else {
                default_labels(group_boundaries.len() - 1, "group")
            }
        } else {
            header.group_labels
        };

        let mut matrix = SignalMatrix::from_parts(
            values,
            regions,
            group_boundaries,
            group_labels,
            sample_boundaries,
            sample_labels,
            MatrixParameters {
                upstream: header.upstream,
                downstream: header.downstream,
                body: header.body,
                bin_size: header.bin_size,
            },
        )?;
        matrix.sort_method = match header.sort_regions.as_deref() {
            Some("ascend") => SortMethod::Ascend,
            Some("descend") => SortMethod::Descend,
            _ => SortMethod::No,
        };
        matrix.sort_criterion = match header.sort_using.as_deref() {
            Some("median") => SortCriterion::Median,
            Some("max") => SortCriterion::Max,
            Some("min") => SortCriterion::Min,
            Some("sum") => SortCriterion::Sum,
            Some("region_length") => SortCriterion::RegionLength,
            _ => SortCriterion::Mean,
        };
        Ok(matrix)
    }

    pub fn from_parts(
        values: Array2<f64>,
        regions: Vec<Region>,
        group_boundaries: Vec<usize>,
        group_labels: Vec<String>,
        sample_boundaries: Vec<usize>,
        sample_labels: Vec<String>,
        parameters: MatrixParameters,
    ) -> Result<SignalMatrix, HeatplotError> {
        check_boundaries(&group_boundaries, values.nrows(), "group")?;
        check_boundaries(&sample_boundaries, values.ncols(), "sample")?;
        if group_labels.len() != group_boundaries.len() - 1 {
            return Err(HeatplotError::MatrixFormat(format!(
                "{} group labels for {} groups",
                group_labels.len(),
                group_boundaries.len() - 1
            )));
        }
        if sample_labels.len() != sample_boundaries.len() - 1 {
            return Err(HeatplotError::MatrixFormat(format!(
                "{} sample labels for {} samples",
                sample_labels.len(),
                sample_boundaries.len() - 1
            )));
        }
        if regions.len() != values.nrows() {
            return Err(HeatplotError::MatrixFormat(format!(
                "{} regions for {} matrix rows",
                regions.len(),
                values.nrows()
            )));
        }
        if parameters.bin_size <= 0.0 {
            return Err(HeatplotError::MatrixFormat("bin size must be > 0".into()));
        }

        // every sample spans the same bin count
        let widths: Vec<usize> = sample_boundaries.windows(2).map(|w| w[1] - w[0]).collect();
        if widths.windows(2).any(|w| w[0] != w[1]) {
            return Err(HeatplotError::MatrixFormat(
                "samples span different bin counts".into(),
            ));
        }

        // (upstream + downstream + body) / bin size must be integral
        let expected = (parameters.upstream + parameters.downstream + parameters.body)
            / parameters.bin_size;
        if (expected - expected.round()).abs() > 1e-6 {
            return Err(HeatplotError::MatrixFormat(format!(
                "(upstream + downstream + body) / bin size = {} is not an integer",
                expected
            )));
        }
        if let Some(&w) = widths.first() {
            if expected.round() as usize != w {
                warn!(
                    "region model implies {} bins per region but the matrix holds {}",
                    expected.round(),
                    w
                );
            }
        }

        Ok(SignalMatrix {
            values,
            regions,
            group_boundaries,
            sample_boundaries,
            group_labels,
            sample_labels,
            parameters,
            sort_method: SortMethod::No,
            sort_criterion: SortCriterion::Mean,
        })
    }

    pub fn num_groups(&self) -> usize {
        self.group_boundaries.len() - 1
    }

    pub fn num_samples(&self) -> usize {
        self.sample_boundaries.len() - 1
    }

    pub fn total_regions(&self) -> usize {
        self.values.nrows()
    }

    pub fn bins_per_sample(&self) -> usize {
        self.sample_boundaries[1] - self.sample_boundaries[0]
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.group_boundaries.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn group_boundaries(&self) -> &[usize] {
        &self.group_boundaries
    }

    pub fn group_labels(&self) -> &[String] {
        &self.group_labels
    }

    pub fn sample_labels(&self) -> &[String] {
        &self.sample_labels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    pub fn sort_criterion(&self) -> SortCriterion {
        self.sort_criterion
    }

    pub fn get_submatrix(&self, group: usize, sample: usize) -> Submatrix<'_> {
        let (r0, r1) = (self.group_boundaries[group], self.group_boundaries[group + 1]);
        let (c0, c1) = (
            self.sample_boundaries[sample],
            self.sample_boundaries[sample + 1],
        );
        Submatrix {
            matrix: self.values.slice(s![r0..r1, c0..c1]),
            group_label: &self.group_labels[group],
            sample_label: &self.sample_labels[sample],
        }
    }

    /// Ordered regions, one slice per group.
    pub fn regions(&self) -> Vec<&[Region]> {
        self.group_boundaries
            .windows(2)
            .map(|w| &self.regions[w[0]..w[1]])
            .collect()
    }

    pub fn set_group_labels(&mut self, labels: Vec<String>) -> Result<(), HeatplotError> {
        if labels.len() != self.num_groups() {
            return Err(HeatplotError::Config(format!(
                "{} group labels given but the matrix has {} groups",
                labels.len(),
                self.num_groups()
            )));
        }
        self.group_labels = labels;
        Ok(())
    }

    pub fn set_sample_labels(&mut self, labels: Vec<String>) -> Result<(), HeatplotError> {
        if labels.len() != self.num_samples() {
            return Err(HeatplotError::Config(format!(
                "{} sample labels given but the matrix has {} samples",
                labels.len(),
                self.num_samples()
            )));
        }
        self.sample_labels = labels;
        Ok(())
    }

    /// Replace the group partition. Row order is untouched, so the new
    /// boundaries must still cover every region.
    pub(crate) fn set_grouping(
        &mut self,
        boundaries: Vec<usize>,
        labels: Vec<String>,
    ) -> Result<(), HeatplotError> {
        check_boundaries(&boundaries, self.values.nrows(), "group")?;
        if labels.len() != boundaries.len() - 1 {
            return Err(HeatplotError::MatrixFormat(format!(
                "{} labels for {} groups",
                labels.len(),
                boundaries.len() - 1
            )));
        }
        self.group_boundaries = boundaries;
        self.group_labels = labels;
        Ok(())
    }

    /// Reorder the regions inside every group by the given criterion. The
    /// whole row (all samples) is aggregated for score-based criteria.
    pub fn sort_groups(&mut self, criterion: SortCriterion, method: SortMethod) {
        if method == SortMethod::No {
            return;
        }
        let mut order = Vec::with_capacity(self.values.nrows());
        for w in self.group_boundaries.windows(2) {
            let (start, end) = (w[0], w[1]);
            let keys: Vec<f64> = (start..end).map(|r| self.row_key(r, criterion)).collect();
            let mut idx: Vec<usize> = (0..end - start).collect();
            idx.sort_by(|&a, &b| match method {
                SortMethod::Descend => keys[b].total_cmp(&keys[a]),
                _ => keys[a].total_cmp(&keys[b]),
            });
            order.extend(idx.into_iter().map(|i| start + i));
        }
        self.permute_rows(&order);
        self.sort_method = method;
        self.sort_criterion = criterion;
    }

    /// Re-partition the regions into `k` clusters and reorder the matrix so
    /// that each cluster forms one contiguous group (largest first).
    pub fn recluster(&mut self, k: usize, method: ClusterMethod) -> Result<(), HeatplotError> {
        let data: Vec<Vec<f64>> = self
            .values
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_finite() { *v } else { 0.0 })
                    .collect()
            })
            .collect();
        let mut labels = match method {
            ClusterMethod::Kmeans => cluster::kmeans(&data, k)?,
            ClusterMethod::Hierarchical => cluster::hierarchical(&data, k)?,
        };
        let k_eff = cluster::relabel_by_size(&mut labels, k);
        if k_eff < k {
            warn!("{} clusters requested but only {} were formed", k, k_eff);
        }

        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.sort_by_key(|&r| (labels[r], r));

        let mut boundaries = vec![0usize];
        let mut counts = vec![0usize; k_eff];
        for &l in &labels {
            counts[l] += 1;
        }
        for c in &counts {
            boundaries.push(boundaries.last().unwrap() + c);
        }

        self.permute_rows(&order);
        self.group_boundaries = boundaries;
        self.group_labels = (1..=k_eff).map(|i| format!("cluster_{}", i)).collect();
        Ok(())
    }

    fn permute_rows(&mut self, order: &[usize]) {
        self.values = self.values.select(Axis(0), order);
        self.regions = order.iter().map(|&r| self.regions[r].clone()).collect();
    }

    fn row_key(&self, row: usize, criterion: SortCriterion) -> f64 {
        if criterion == SortCriterion::RegionLength {
            let region = &self.regions[row];
            return region.end.saturating_sub(region.start) as f64;
        }
        let mut finite: Vec<f64> = self
            .values
            .row(row)
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            return f64::NEG_INFINITY;
        }
        match criterion {
            SortCriterion::Mean => finite.iter().sum::<f64>() / finite.len() as f64,
            SortCriterion::Median => {
                finite.sort_by(|a, b| a.total_cmp(b));
                crate::scaling::percentile_sorted(&finite, 50.0)
            }
            SortCriterion::Max => finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            SortCriterion::Min => finite.iter().copied().fold(f64::INFINITY, f64::min),
            SortCriterion::Sum => finite.iter().sum(),
            SortCriterion::RegionLength => unreachable!(),
        }
    }
}

fn parse_score(field: &str) -> f64 {
    match field.trim() {
        "" | "NA" | "na" | "None" => f64::NAN,
        v => v.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn default_labels(n: usize, prefix: &str) -> Vec<String> {
    (1..=n).map(|i| format!("{}_{}", prefix, i)).collect()
}

fn check_boundaries(
    boundaries: &[usize],
    total: usize,
    what: &str,
) -> Result<(), HeatplotError> {
    let increasing = boundaries.windows(2).all(|w| w[0] < w[1]);
    if boundaries.len() < 2
        || boundaries[0] != 0
        || *boundaries.last().unwrap() != total
        || !increasing
    {
        return Err(HeatplotError::MatrixFormat(format!(
            "{} boundaries {:?} do not partition {} entries",
            what, boundaries, total
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use ndarray::arr2;
    use std::io::Write;

    pub(crate) fn region(chrom: &str, start: u64, end: u64, name: &str) -> Region {
        Region {
            chrom: chrom.to_string(),
            start,
            end,
            name: name.to_string(),
            score: ".".to_string(),
            strand: "+".to_string(),
        }
    }

    fn small_matrix() -> SignalMatrix {
        // 4 regions x (2 samples * 2 bins), two groups of 2
        let values = arr2(&[
            [1.0, 1.0, 5.0, 5.0],
            [3.0, 3.0, 7.0, 7.0],
            [2.0, 2.0, 6.0, 6.0],
            [4.0, 4.0, 8.0, 8.0],
        ]);
        let regions = vec![
            region("chr1", 0, 100, "a"),
            region("chr1", 200, 500, "b"),
            region("chr2", 0, 50, "c"),
            region("chr2", 100, 900, "d"),
        ];
        SignalMatrix::from_parts(
            values,
            regions,
            vec![0, 2, 4],
            vec!["g1".into(), "g2".into()],
            vec![0, 2, 4],
            vec!["s1".into(), "s2".into()],
            MatrixParameters {
                upstream: 10.0,
                downstream: 10.0,
                body: 0.0,
                bin_size: 10.0,
            },
        )
        .unwrap()
    }

    fn gz_fixture() -> Vec<u8> {
        let header = concat!(
            "@{\"upstream\":20,\"downstream\":20,\"body\":0,\"bin size\":10,",
            "\"sample_labels\":[\"s1\",\"s2\"],\"sample_boundaries\":[0,4,8],",
            "\"group_labels\":[\"up\",\"down\"],\"group_boundaries\":[0,1,3],",
            "\"sort regions\":\"no\",\"sort using\":\"mean\"}\n"
        );
        let mut text = String::from(header);
        text.push_str("chr1\t0\t100\tr1\t.\t+\t1\t2\t3\t4\t5\t6\t7\t8\n");
        text.push_str("chr1\t300\t400\tr2\t.\t-\tnan\t2\t3\t4\t5\t6\t7\t8\n");
        text.push_str("chr2\t0\t100\tr3\t.\t+\t1\t2\t3\t4\t5\t6\t7\t8\n");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn read_matrix_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.gz");
        std::fs::write(&path, gz_fixture()).unwrap();

        let m = SignalMatrix::from_file(&path).unwrap();
        assert_eq!(m.num_groups(), 2);
        assert_eq!(m.num_samples(), 2);
        assert_eq!(m.total_regions(), 3);
        assert_eq!(m.bins_per_sample(), 4);
        assert_eq!(m.group_labels(), &["up".to_string(), "down".to_string()]);
        assert!(m.get_submatrix(0, 0).matrix[[0, 0]] == 1.0);
        assert!(m.get_submatrix(1, 1).matrix[[0, 0]] == 5.0);
        // the nan cell survives as NaN
        assert!(m.values()[[1, 0]].is_nan());
    }

    #[test]
    fn rejects_ragged_rows() {
        let text = "@{\"bin size\":10,\"upstream\":10,\"downstream\":10,\"body\":0}\n\
                    chr1\t0\t1\tr\t.\t+\t1\t2\n\
                    chr1\t0\t1\tr\t.\t+\t1\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix");
        std::fs::write(&path, text).unwrap();
        assert!(matches!(
            SignalMatrix::from_file(&path),
            Err(HeatplotError::MatrixFormat(_))
        ));
    }

    #[test]
    fn rejects_non_integral_bin_count() {
        let m = SignalMatrix::from_parts(
            arr2(&[[1.0]]),
            vec![region("chr1", 0, 1, "r")],
            vec![0, 1],
            vec!["g".into()],
            vec![0, 1],
            vec!["s".into()],
            MatrixParameters {
                upstream: 15.0,
                downstream: 0.0,
                body: 0.0,
                bin_size: 10.0,
            },
        );
        assert!(matches!(m, Err(HeatplotError::MatrixFormat(_))));
    }

    #[test]
    fn submatrix_shapes() {
        let m = small_matrix();
        let sub = m.get_submatrix(0, 1);
        assert_eq!(sub.matrix.dim(), (2, 2));
        assert_eq!(sub.group_label, "g1");
        assert_eq!(sub.sample_label, "s2");
    }

    #[test]
    fn sort_groups_descending_by_mean() {
        let mut m = small_matrix();
        m.sort_groups(SortCriterion::Mean, SortMethod::Descend);
        // within each group the higher-mean row comes first
        assert_eq!(m.values()[[0, 0]], 3.0);
        assert_eq!(m.values()[[1, 0]], 1.0);
        assert_eq!(m.values()[[2, 0]], 4.0);
        assert_eq!(m.values()[[3, 0]], 2.0);
        // regions move with their rows
        assert_eq!(m.regions()[0][0].name, "b");
        assert_eq!(m.sort_method(), SortMethod::Descend);
    }

    #[test]
    fn sort_by_region_length() {
        let mut m = small_matrix();
        m.sort_groups(SortCriterion::RegionLength, SortMethod::Ascend);
        assert_eq!(m.regions()[0][0].name, "a"); // 100 < 300
        assert_eq!(m.regions()[1][0].name, "c"); // 50 < 800
    }

    #[test]
    fn recluster_rewrites_grouping() {
        let mut m = small_matrix();
        m.recluster(2, ClusterMethod::Kmeans).unwrap();
        assert_eq!(m.num_groups(), 2);
        assert_eq!(m.group_labels()[0], "cluster_1");
        let sizes = m.group_sizes();
        assert_eq!(sizes.iter().sum::<usize>(), 4);
    }

    #[test]
    fn label_override_count_must_match() {
        let mut m = small_matrix();
        assert!(m.set_group_labels(vec!["only one".into()]).is_err());
        assert!(m
            .set_sample_labels(vec!["x".into(), "y".into()])
            .is_ok());
    }

    #[test]
    fn bad_boundaries_are_rejected() {
        let r = SignalMatrix::from_parts(
            arr2(&[[1.0], [2.0]]),
            vec![region("chr1", 0, 1, "a"), region("chr1", 1, 2, "b")],
            vec![0, 2, 2],
            vec!["g1".into(), "g2".into()],
            vec![0, 1],
            vec!["s".into()],
            MatrixParameters {
                upstream: 10.0,
                downstream: 0.0,
                body: 0.0,
                bin_size: 10.0,
            },
        );
        assert!(matches!(r, Err(HeatplotError::MatrixFormat(_))));
    }
}
