use std::fmt;
use std::io;

#[derive(Debug)]
pub enum HeatplotError {
    /// Bad option value (unrecognized color, label count mismatch, ...).
    Config(String),
    /// The matrix file violates a structural invariant.
    MatrixFormat(String),
    /// A group holds too few regions to occupy a visible row band.
    DegenerateGroup { label: String, size: usize },
    /// Layout arithmetic produced a non-finite ratio.
    Layout(String),
    Io(io::Error),
}

impl fmt::Display for HeatplotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeatplotError::Config(msg) => write!(f, "configuration error: {}", msg),
            HeatplotError::MatrixFormat(msg) => write!(f, "matrix format error: {}", msg),
            HeatplotError::DegenerateGroup { label, size } => write!(
                f,
                "group '{}' contains too few regions ({}). It can't be plotted. \
                 Try removing this group.",
                label, size
            ),
            HeatplotError::Layout(msg) => write!(f, "layout error: {}", msg),
            HeatplotError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for HeatplotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeatplotError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for HeatplotError {
    fn from(err: io::Error) -> HeatplotError {
        HeatplotError::Io(err)
    }
}
