//! Logging and observability
//!
//! Structured logging through `tracing`, with:
//! - configurable log levels (`RUST_LOG` overrides the configured level)
//! - console output on stderr
//! - optional JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use sowtrack::logging::init_logging;
//! use sowtrack::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(farm_id = "F1", "Listing active records");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a completed stage transition
///
/// # Example
///
/// ```no_run
/// use sowtrack::log_transition;
/// use sowtrack::domain::{AnimalId, RecordId, Stage};
///
/// let animal = AnimalId::new("P1").unwrap();
/// let source = RecordId::new("B1").unwrap();
/// let destination = RecordId::new("G1").unwrap();
/// log_transition!(&animal, &source, &destination, Stage::Breeding, Stage::Gestation);
/// ```
#[macro_export]
macro_rules! log_transition {
    ($animal_id:expr, $source:expr, $destination:expr, $from:expr, $to:expr) => {
        tracing::info!(
            animal_id = %$animal_id,
            source_record_id = %$source,
            record_id = %$destination,
            from_stage = %$from,
            to_stage = %$to,
            "Stage transition completed"
        );
    };
}

/// Log a served listing page
///
/// # Example
///
/// ```no_run
/// use sowtrack::log_page_served;
///
/// log_page_served!("active", "FARM#F1#STAGE#gestation#ACTIVE", 50, true);
/// ```
#[macro_export]
macro_rules! log_page_served {
    ($mode:expr, $partition:expr, $count:expr, $has_more:expr) => {
        tracing::debug!(
            mode = $mode,
            partition = %$partition,
            count = $count,
            has_more = $has_more,
            "Served listing page"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use sowtrack::log_error_with_context;
/// use sowtrack::domain::SowtrackError;
///
/// let error = SowtrackError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
