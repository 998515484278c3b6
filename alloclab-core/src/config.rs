//! Engine configuration.
//!
//! Every tunable the engine reads lives in [`EngineConfig`]. It is passed
//! explicitly into `run_backtest` and the ledger; there are no globals.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::execution::{ExecutionAlgorithm, SlippageModel, TransactionCostModel};
use crate::sizing::{SizingEngine, SizingPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}

/// What the loop does when a symbol it needs has no usable bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataGapPolicy {
    /// Freeze the symbol at its last valid close; the step still trades the
    /// other symbols and records equity.
    #[default]
    Hold,
    /// Skip the entire step: no trades, no equity point.
    Skip,
}

/// Price at which orders decided at step `t` execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPricePolicy {
    /// `t`'s open; the decision may see that open.
    #[default]
    Open,
    /// Last close strictly before `t`.
    PreviousClose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub sizing_policy: SizingPolicy,
    /// Per-symbol cap as a fraction of equity.
    pub max_position_weight: f64,
    /// Fraction of equity kept in cash.
    pub min_cash_buffer: f64,
    /// Positions worth less than this are not opened.
    pub min_position_value: f64,
    pub commission_fixed: f64,
    pub commission_pct: f64,
    pub commission_per_share: f64,
    pub slippage_model: SlippageModel,
    pub max_slippage_bps: f64,
    /// Minimum `|target − current| / equity` that triggers a trade.
    pub rebalance_drift_threshold: f64,
    pub data_gap_policy: DataGapPolicy,
    pub execution_price: ExecutionPricePolicy,
    pub execution_algorithm: ExecutionAlgorithm,
    /// Length of the virtual window slices are scheduled across.
    pub execution_window_minutes: i64,
    /// Visible bars used for average volume and volatility.
    pub cost_lookback: usize,
    pub reconcile_after_each_fill: bool,
    /// Let buys dip into the cash buffer (never below zero cash).
    pub allow_cash_buffer_breach: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            sizing_policy: SizingPolicy::Fractional,
            max_position_weight: 1.0,
            min_cash_buffer: 0.0,
            min_position_value: 0.0,
            commission_fixed: 0.0,
            commission_pct: 0.0,
            commission_per_share: 0.0,
            slippage_model: SlippageModel::default(),
            max_slippage_bps: 0.0,
            rebalance_drift_threshold: 0.0,
            data_gap_policy: DataGapPolicy::Hold,
            execution_price: ExecutionPricePolicy::Open,
            execution_algorithm: ExecutionAlgorithm::Immediate,
            execution_window_minutes: 390,
            cost_lookback: 20,
            reconcile_after_each_fill: cfg!(debug_assertions),
            allow_cash_buffer_breach: false,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_fraction(field: &'static str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let ok = value.is_finite() && value <= 1.0 && if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !ok {
        let range = if allow_zero { "[0, 1]" } else { "(0, 1]" };
        return Err(invalid(field, format!("must be in {range}, got {value}")));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, format!("must be finite and >= 0, got {value}")));
    }
    Ok(())
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(invalid(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        check_fraction("max_position_weight", self.max_position_weight, false)?;
        check_fraction("min_cash_buffer", self.min_cash_buffer, true)?;
        if self.min_cash_buffer >= 1.0 {
            return Err(invalid("min_cash_buffer", "must leave something to invest"));
        }
        check_fraction("rebalance_drift_threshold", self.rebalance_drift_threshold, true)?;
        check_non_negative("min_position_value", self.min_position_value)?;
        check_non_negative("commission_fixed", self.commission_fixed)?;
        check_non_negative("commission_pct", self.commission_pct)?;
        check_non_negative("commission_per_share", self.commission_per_share)?;
        check_non_negative("max_slippage_bps", self.max_slippage_bps)?;

        match self.slippage_model {
            SlippageModel::Fixed { bps } => check_non_negative("slippage_model.bps", bps)?,
            SlippageModel::Linear { coefficient_bps } => {
                check_non_negative("slippage_model.coefficient_bps", coefficient_bps)?
            }
            SlippageModel::Sqrt { coefficient } => {
                check_non_negative("slippage_model.coefficient", coefficient)?
            }
        }

        if self.execution_window_minutes < 0 {
            return Err(invalid(
                "execution_window_minutes",
                format!("must be >= 0, got {}", self.execution_window_minutes),
            ));
        }
        if self.cost_lookback == 0 {
            return Err(invalid("cost_lookback", "must be at least 1"));
        }
        self.execution_algorithm
            .validate(self.sizing_policy)
            .map_err(|e| invalid("execution_algorithm", e.to_string()))?;
        Ok(())
    }

    pub fn sizing_engine(&self) -> SizingEngine {
        SizingEngine::new(self.sizing_policy, self.min_position_value)
    }

    pub fn cost_model(&self) -> TransactionCostModel {
        TransactionCostModel {
            commission_fixed: self.commission_fixed,
            commission_pct: self.commission_pct,
            commission_per_share: self.commission_per_share,
            slippage: self.slippage_model.clone(),
            max_slippage_bps: self.max_slippage_bps,
        }
    }

    pub fn with_costs(mut self, costs: &TransactionCostModel) -> Self {
        self.commission_fixed = costs.commission_fixed;
        self.commission_pct = costs.commission_pct;
        self.commission_per_share = costs.commission_per_share;
        self.slippage_model = costs.slippage.clone();
        self.max_slippage_bps = costs.max_slippage_bps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            initial_capital = 50000.0
            sizing_policy = "WHOLE"
            rebalance_drift_threshold = 0.01

            [execution_algorithm]
            type = "TWAP"
            n_slices = 4

            [slippage_model]
            type = "SQRT"
            coefficient = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_capital, 50_000.0);
        assert_eq!(config.sizing_policy, SizingPolicy::Whole);
        assert_eq!(config.execution_algorithm, ExecutionAlgorithm::Twap { n_slices: 4 });
        assert_eq!(config.slippage_model, SlippageModel::Sqrt { coefficient: 0.5 });
        assert_eq!(config.max_position_weight, 1.0);
        assert_eq!(config.data_gap_policy, DataGapPolicy::Hold);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let cases: Vec<(&str, EngineConfig)> = vec![
            (
                "initial_capital",
                EngineConfig {
                    initial_capital: 0.0,
                    ..Default::default()
                },
            ),
            (
                "max_position_weight",
                EngineConfig {
                    max_position_weight: 1.5,
                    ..Default::default()
                },
            ),
            (
                "min_cash_buffer",
                EngineConfig {
                    min_cash_buffer: -0.1,
                    ..Default::default()
                },
            ),
            (
                "commission_pct",
                EngineConfig {
                    commission_pct: f64::NAN,
                    ..Default::default()
                },
            ),
            (
                "cost_lookback",
                EngineConfig {
                    cost_lookback: 0,
                    ..Default::default()
                },
            ),
            (
                "execution_algorithm",
                EngineConfig {
                    execution_algorithm: ExecutionAlgorithm::Twap { n_slices: 0 },
                    ..Default::default()
                },
            ),
        ];
        for (field, config) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn whole_policy_rejects_fractional_iceberg_clip() {
        let config = EngineConfig {
            sizing_policy: SizingPolicy::Whole,
            execution_algorithm: ExecutionAlgorithm::Iceberg { clip_size: 2.5 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_enum_variant_is_a_parse_error() {
        let err = EngineConfig::from_toml_str(r#"data_gap_policy = "INTERPOLATE""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn cost_model_round_trips_through_config() {
        let costs = TransactionCostModel::realistic();
        let config = EngineConfig::default().with_costs(&costs);
        assert_eq!(config.cost_model(), costs);
    }

    #[test]
    fn config_error_converts_to_engine_error() {
        let err: EngineError = invalid("cost_lookback", "zero").into();
        assert!(err.is_fatal());
    }
}
