use std::{fmt, rc::Rc, str::FromStr};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, ResodeError},
    ode_solver::{
        explicit::{Predictor, PredictorPoint},
        lte::ErrorEstimator,
        residual::ImplicitFormula,
    },
};

/// An exact derivative `dy/dt = f(t, y)` of the problem, used by some error estimators.
pub type DydtFunction = Rc<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>;

/// Largest number of history points a scheme may ask the bootstrap for.
pub const MAX_BOOTSTRAP_ORDER: usize = 12;

/// The closed set of time stepping schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeName {
    Bdf1,
    Bdf2,
    Bdf3,
    Bdf4,
    /// BDF2 with the explicit midpoint error estimator.
    Bdf2Mp,
    /// BDF2 with the explicit BDF3 error estimator.
    Bdf2Ebdf3,
    Imr,
    /// Implicit midpoint with the explicit BDF3 error estimator.
    ImrEbdf3,
    /// Implicit midpoint with the two-predictor error estimator.
    ImrW18,
    Trapezoid,
    /// Trapezoid rule with the Adams-Bashforth 2 error estimator.
    TrAb,
}

impl SchemeName {
    pub const ALL: [SchemeName; 11] = [
        SchemeName::Bdf1,
        SchemeName::Bdf2,
        SchemeName::Bdf3,
        SchemeName::Bdf4,
        SchemeName::Bdf2Mp,
        SchemeName::Bdf2Ebdf3,
        SchemeName::Imr,
        SchemeName::ImrEbdf3,
        SchemeName::ImrW18,
        SchemeName::Trapezoid,
        SchemeName::TrAb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeName::Bdf1 => "bdf1",
            SchemeName::Bdf2 => "bdf2",
            SchemeName::Bdf3 => "bdf3",
            SchemeName::Bdf4 => "bdf4",
            SchemeName::Bdf2Mp => "bdf2-mp",
            SchemeName::Bdf2Ebdf3 => "bdf2-ebdf3",
            SchemeName::Imr => "imr",
            SchemeName::ImrEbdf3 => "imr-ebdf3",
            SchemeName::ImrW18 => "imr-w18",
            SchemeName::Trapezoid => "trapezoid",
            SchemeName::TrAb => "tr-ab",
        }
    }

    pub fn formula(&self) -> ImplicitFormula {
        match self {
            SchemeName::Bdf1 => ImplicitFormula::Bdf1,
            SchemeName::Bdf2 | SchemeName::Bdf2Mp | SchemeName::Bdf2Ebdf3 => ImplicitFormula::Bdf2,
            SchemeName::Bdf3 => ImplicitFormula::Bdf3,
            SchemeName::Bdf4 => ImplicitFormula::Bdf4,
            SchemeName::Imr | SchemeName::ImrEbdf3 | SchemeName::ImrW18 => {
                ImplicitFormula::Midpoint
            }
            SchemeName::Trapezoid | SchemeName::TrAb => ImplicitFormula::Trapezoid,
        }
    }
}

impl fmt::Display for SchemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeName {
    type Err = ResodeError;

    /// Case insensitive; spaces and underscores may stand in for hyphens and `tr` is accepted
    /// for `trapezoid`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_lowercase().replace([' ', '_'], "-");
        if normalised == "tr" {
            return Ok(SchemeName::Trapezoid);
        }
        SchemeName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalised)
            .ok_or_else(|| ResodeError::from(ConfigurationError::UnknownScheme(s.to_string())))
    }
}

/// Weighting of the difference between BDF2 and the explicit midpoint predictor.
///
/// Both are exact to leading order for constant steps and differ for varying steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Bdf2MidpointWeight {
    /// `(k + h) / (3h + 2k)`
    #[default]
    Prinja,
    /// `(1 + 1/r)^2 / (1 + 3/r + 4/r^2 + 2/r^3)`, `r = h/k`
    GreshoSani,
}

impl Bdf2MidpointWeight {
    /// Weight for the current step `h` and previous step `k`.
    pub fn weight(&self, h: f64, k: f64) -> f64 {
        match self {
            Bdf2MidpointWeight::Prinja => (k + h) / (3.0 * h + 2.0 * k),
            Bdf2MidpointWeight::GreshoSani => {
                let rinv = k / h;
                (1.0 + rinv).powi(2) / (1.0 + 3.0 * rinv + 4.0 * rinv.powi(2) + 2.0 * rinv.powi(3))
            }
        }
    }
}

/// A scheme name plus the auxiliary parameters some schemes take.
///
/// Validated into a [SchemeDescriptor] once, before integration starts.
#[derive(Clone)]
pub struct SchemeSpec {
    name: SchemeName,
    dydt: Option<DydtFunction>,
    predictors: Option<(Vec<PredictorPoint>, Vec<PredictorPoint>)>,
    bdf2_weight: Bdf2MidpointWeight,
}

impl SchemeSpec {
    pub fn new(name: SchemeName) -> Self {
        Self {
            name,
            dydt: None,
            predictors: None,
            bdf2_weight: Bdf2MidpointWeight::default(),
        }
    }

    pub fn name(&self) -> SchemeName {
        self.name
    }

    /// Supply the exact derivative `dy/dt = f(t, y)`, required by `tr-ab` and optional for the
    /// explicit BDF3 and two-predictor estimators.
    pub fn with_exact_derivative(
        mut self,
        dydt: impl Fn(f64, &DVector<f64>) -> DVector<f64> + 'static,
    ) -> Self {
        self.dydt = Some(Rc::new(dydt));
        self
    }

    /// Supply the point sets of the two predictors used by `imr-w18`.
    pub fn with_predictors(mut self, p1: Vec<PredictorPoint>, p2: Vec<PredictorPoint>) -> Self {
        self.predictors = Some((p1, p2));
        self
    }

    pub fn with_bdf2_weight(mut self, weight: Bdf2MidpointWeight) -> Self {
        self.bdf2_weight = weight;
        self
    }

    /// Check the parameters against the scheme and resolve everything needed to step.
    pub fn descriptor(&self) -> Result<SchemeDescriptor, ResodeError> {
        let name = self.name;
        let (estimator, bootstrap_order) = match name {
            SchemeName::Bdf1 | SchemeName::Imr => (None, 1),
            SchemeName::Bdf2 | SchemeName::Trapezoid => (None, 2),
            SchemeName::Bdf3 => (None, 3),
            SchemeName::Bdf4 => (None, 4),
            SchemeName::Bdf2Mp => (Some(ErrorEstimator::Bdf2Midpoint(self.bdf2_weight)), 3),
            SchemeName::Bdf2Ebdf3 => (Some(ErrorEstimator::ExplicitBdf3(self.dydt.clone())), 4),
            SchemeName::ImrEbdf3 => (Some(ErrorEstimator::ExplicitBdf3(self.dydt.clone())), 5),
            SchemeName::TrAb => {
                let dydt = self.dydt.clone().ok_or(ConfigurationError::MissingParameter {
                    scheme: name.as_str(),
                    parameter: "dydt",
                })?;
                (Some(ErrorEstimator::TrapezoidAb2(dydt)), 2)
            }
            SchemeName::ImrW18 => {
                let (p1, p2) =
                    self.predictors
                        .as_ref()
                        .ok_or(ConfigurationError::MissingParameter {
                            scheme: name.as_str(),
                            parameter: "predictors",
                        })?;
                let predictors = [predictor(1, p1)?, predictor(2, p2)?];
                if predictors.iter().any(|p| p.needs_derivative()) && self.dydt.is_none() {
                    return Err(ResodeError::from(ConfigurationError::MissingParameter {
                        scheme: name.as_str(),
                        parameter: "dydt",
                    }));
                }
                let depth = predictors
                    .iter()
                    .map(|p| p.committed_points())
                    .max()
                    .unwrap_or(1);
                if depth > MAX_BOOTSTRAP_ORDER {
                    return Err(ResodeError::from(ConfigurationError::PredictorTooDeep {
                        depth,
                        maximum: MAX_BOOTSTRAP_ORDER,
                    }));
                }
                let estimator = ErrorEstimator::TwoPredictor {
                    predictors,
                    dydt: self.dydt.clone(),
                };
                (Some(estimator), depth.max(2))
            }
        };
        Ok(SchemeDescriptor {
            name,
            formula: name.formula(),
            estimator,
            bootstrap_order,
        })
    }
}

fn predictor(index: usize, points: &[PredictorPoint]) -> Result<Predictor, ResodeError> {
    Predictor::new(points).ok_or_else(|| {
        ResodeError::from(ConfigurationError::InvalidPredictor {
            index,
            found: format!("{points:?}"),
        })
    })
}

impl From<SchemeName> for SchemeSpec {
    fn from(name: SchemeName) -> Self {
        Self::new(name)
    }
}

impl FromStr for SchemeSpec {
    type Err = ResodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.parse()?))
    }
}

impl fmt::Debug for SchemeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeSpec")
            .field("name", &self.name)
            .field("dydt", &self.dydt.is_some())
            .field("predictors", &self.predictors)
            .field("bdf2_weight", &self.bdf2_weight)
            .finish()
    }
}

/// A validated scheme: the implicit formula, its optional error estimator and the number of
/// history points it needs before the first regular step.
#[derive(Clone, Debug)]
pub struct SchemeDescriptor {
    pub name: SchemeName,
    pub formula: ImplicitFormula,
    pub estimator: Option<ErrorEstimator>,
    pub bootstrap_order: usize,
}

impl SchemeDescriptor {
    pub fn order(&self) -> usize {
        self.formula.order()
    }

    pub fn has_estimator(&self) -> bool {
        self.estimator.is_some()
    }
}
