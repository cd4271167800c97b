use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};
use plotters::style::RGBColor;

use crate::error::HeatplotError;

/// Pseudo-color mapping from a normalized value in [0, 1] to an RGB triple.
#[derive(Debug, Clone)]
pub struct Colormap {
    stops: Vec<(u8, u8, u8)>,
    buckets: Option<usize>,
    viridis: bool,
}

impl Colormap {
    pub fn from_name(name: &str) -> Result<Colormap, HeatplotError> {
        if name.eq_ignore_ascii_case("viridis") {
            return Ok(Colormap {
                stops: Vec::new(),
                buckets: None,
                viridis: true,
            });
        }
        let stops: &[(u8, u8, u8)] = match name {
            "RdYlBu" => &[
                (165, 0, 38),
                (244, 109, 67),
                (254, 224, 144),
                (224, 243, 248),
                (116, 173, 209),
                (49, 54, 149),
            ],
            "RdBu" => &[
                (103, 0, 31),
                (214, 96, 77),
                (247, 247, 247),
                (67, 147, 195),
                (5, 48, 97),
            ],
            "Reds" => &[(255, 245, 240), (251, 106, 74), (103, 0, 13)],
            "Blues" => &[(247, 251, 255), (107, 174, 214), (8, 48, 107)],
            "Greens" => &[(247, 252, 245), (116, 196, 118), (0, 68, 27)],
            "binary" => &[(255, 255, 255), (0, 0, 0)],
            "coolwarm" => &[
                (59, 76, 192),
                (144, 178, 254),
                (220, 220, 220),
                (245, 156, 125),
                (180, 4, 38),
            ],
            "jet" => JET_STOPS,
            _ => {
                return Err(HeatplotError::Config(format!(
                    "unrecognized color map '{}'",
                    name
                )))
            }
        };
        Ok(Colormap {
            stops: stops.to_vec(),
            buckets: None,
            viridis: false,
        })
    }

    /// Build a map from an explicit ordered color list, quantized to `buckets`.
    pub fn from_list(colors: &[String], buckets: usize) -> Result<Colormap, HeatplotError> {
        if colors.len() < 2 {
            return Err(HeatplotError::Config(
                "a color list needs at least two colors".to_string(),
            ));
        }
        let stops = colors
            .iter()
            .map(|c| parse_color(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Colormap {
            stops,
            buckets: Some(buckets.max(2)),
            viridis: false,
        })
    }

    pub fn eval(&self, t: f64) -> (u8, u8, u8) {
        let mut t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        if let Some(n) = self.buckets {
            // snap to the bucket midpoint
            let idx = ((t * n as f64).floor() as usize).min(n - 1);
            t = (idx as f64 + 0.5) / n as f64;
        }
        if self.viridis {
            let c = ViridisRGB.get_color(t);
            return (c.0, c.1, c.2);
        }
        let segments = self.stops.len() - 1;
        let pos = t * segments as f64;
        let i = (pos.floor() as usize).min(segments - 1);
        let frac = pos - i as f64;
        let (r0, g0, b0) = self.stops[i];
        let (r1, g1, b1) = self.stops[i + 1];
        (
            lerp(r0, r1, frac),
            lerp(g0, g1, frac),
            lerp(b0, b1, frac),
        )
    }
}

const JET_STOPS: &[(u8, u8, u8)] = &[
    (0, 0, 128),
    (0, 0, 255),
    (0, 255, 255),
    (255, 255, 0),
    (255, 0, 0),
    (128, 0, 0),
];

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

/// Categorical palette for the profile lines, indexed by position.
pub fn categorical(index: usize, count: usize) -> RGBColor {
    let n = count.max(1);
    let t = index as f64 / n as f64;
    let segments = JET_STOPS.len() - 1;
    let pos = t * segments as f64;
    let i = (pos.floor() as usize).min(segments - 1);
    let frac = pos - i as f64;
    let (r0, g0, b0) = JET_STOPS[i];
    let (r1, g1, b1) = JET_STOPS[i + 1];
    RGBColor(lerp(r0, r1, frac), lerp(g0, g1, frac), lerp(b0, b1, frac))
}

pub fn parse_color(value: &str) -> Result<(u8, u8, u8), HeatplotError> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16);
            let g = u8::from_str_radix(&hex[2..4], 16);
            let b = u8::from_str_radix(&hex[4..6], 16);
            if let (Ok(r), Ok(g), Ok(b)) = (r, g, b) {
                return Ok((r, g, b));
            }
        }
        return Err(HeatplotError::Config(format!(
            "the value '{}' is not a valid color",
            value
        )));
    }
    match value.to_ascii_lowercase().as_str() {
        "black" => Ok((0, 0, 0)),
        "white" => Ok((255, 255, 255)),
        "red" => Ok((255, 0, 0)),
        "green" => Ok((0, 128, 0)),
        "blue" => Ok((0, 0, 255)),
        "yellow" => Ok((255, 255, 0)),
        "orange" => Ok((255, 165, 0)),
        "purple" => Ok((128, 0, 128)),
        "grey" | "gray" => Ok((128, 128, 128)),
        "lightgrey" | "lightgray" => Ok((211, 211, 211)),
        "cyan" => Ok((0, 255, 255)),
        "magenta" => Ok((255, 0, 255)),
        _ => Err(HeatplotError::Config(format!(
            "the value '{}' is not a valid color",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_map_endpoints() {
        let cmap = Colormap::from_name("binary").unwrap();
        assert_eq!(cmap.eval(0.0), (255, 255, 255));
        assert_eq!(cmap.eval(1.0), (0, 0, 0));
    }

    #[test]
    fn unknown_map_is_config_error() {
        let err = Colormap::from_name("no_such_map").unwrap_err();
        assert!(matches!(err, HeatplotError::Config(_)));
    }

    #[test]
    fn color_list_quantizes_to_buckets() {
        let colors = vec!["black".to_string(), "white".to_string()];
        let cmap = Colormap::from_list(&colors, 2).unwrap();
        // two buckets: everything below 0.5 maps to the first midpoint
        assert_eq!(cmap.eval(0.0), cmap.eval(0.49));
        assert_ne!(cmap.eval(0.49), cmap.eval(0.51));
    }

    #[test]
    fn parse_hex_and_named() {
        assert_eq!(parse_color("#ff8000").unwrap(), (255, 128, 0));
        assert_eq!(parse_color("black").unwrap(), (0, 0, 0));
        assert!(parse_color("notacolor").is_err());
    }

    #[test]
    fn out_of_range_values_clamp() {
        let cmap = Colormap::from_name("RdYlBu").unwrap();
        assert_eq!(cmap.eval(-3.0), cmap.eval(0.0));
        assert_eq!(cmap.eval(7.0), cmap.eval(1.0));
        // non-finite input falls back to the low end
        assert_eq!(cmap.eval(f64::NAN), cmap.eval(0.0));
    }
}
