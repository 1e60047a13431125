// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `test`, plus the
// data/embedding flags both of them share.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for bad values
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::Path;

use crate::application::{
    test_use_case::TestConfig,
    train_use_case::{DataConfig, TrainConfig},
};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train BiDAF on the train split, resuming if possible
    Train(TrainArgs),

    /// Evaluate the latest model snapshot on the test split
    Test(TestArgs),
}

/// Flags shared by every subcommand. They are global, so they
/// may appear before or after the subcommand name.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory with data_{train,test}.json and shared_{train,test}.json
    #[arg(long, global = true, default_value = "./dataset")]
    pub data_dir: String,

    /// Directory with glove.6B.{dim}d.txt
    #[arg(long, global = true, default_value = "./dataset")]
    pub glove_dir: String,

    /// Where checkpoints, snapshots and the model config live
    #[arg(long, global = true, default_value = "./checkpoints")]
    pub checkpoint_dir: String,

    /// Vocabulary / GloVe cache directory
    #[arg(long, global = true, default_value = "./cache")]
    pub cache_dir: String,

    /// Read vocabularies and GloVe vectors from the cache when present
    #[arg(long, global = true)]
    pub use_cache: bool,

    /// Samples per batch; an incomplete last batch is skipped
    #[arg(long, global = true, default_value_t = 32)]
    pub batch_size: usize,

    /// Word embedding size (must match a GloVe file)
    #[arg(long, global = true, default_value_t = 100)]
    pub w_embd_size: usize,

    /// Character embedding size
    #[arg(long, global = true, default_value_t = 8)]
    pub c_embd_size: usize,

    /// Output channels per character filter
    #[arg(long, global = true, default_value_t = 100)]
    pub out_chs: usize,

    /// Character filter width; repeat for several filters
    #[arg(long = "filter-width", global = true, default_values_t = [5usize])]
    pub filter_widths: Vec<usize>,

    /// Random seed for weights, dropout and batch order
    #[arg(long, global = true, default_value_t = 1111)]
    pub seed: u64,

    /// Hide progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

impl From<DataArgs> for DataConfig {
    fn from(a: DataArgs) -> Self {
        DataConfig {
            data_dir:       a.data_dir,
            glove_dir:      a.glove_dir,
            checkpoint_dir: a.checkpoint_dir,
            cache_dir:      a.cache_dir,
            use_cache:      a.use_cache,
            batch_size:     a.batch_size,
            w_embd_size:    a.w_embd_size,
            c_embd_size:    a.c_embd_size,
            out_chs:        a.out_chs,
            filter_widths:  a.filter_widths,
            seed:           a.seed,
            show_progress:  !a.no_progress,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Epochs to run in this invocation
    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// First epoch number when starting without a checkpoint
    #[arg(long, default_value_t = 0)]
    pub start_epoch: usize,

    /// Checkpoint directory to resume from [default: <checkpoint-dir>/model_best]
    #[arg(long)]
    pub resume: Option<String>,

    /// EMA decay applied to the weights after every step
    #[arg(long, default_value_t = 0.999)]
    pub ema_decay: f64,

    /// Dropout probability
    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    /// Batches between progress reports
    #[arg(long, default_value_t = 100)]
    pub log_interval: usize,

    /// Batches between snapshot saves
    #[arg(long, default_value_t = 100)]
    pub snapshot_interval: usize,

    /// Root directory for timestamped metric runs
    #[arg(long, default_value = "./logs")]
    pub log_dir: String,
}

impl TrainArgs {
    /// Combine with the shared flags into the application-layer config.
    /// The application layer never sees clap types.
    pub fn into_config(self, data: DataArgs) -> TrainConfig {
        let resume = self.resume.unwrap_or_else(|| {
            Path::new(&data.checkpoint_dir).join("model_best").display().to_string()
        });
        TrainConfig {
            data:              data.into(),
            lr:                self.lr,
            epochs:            self.epochs,
            start_epoch:       self.start_epoch,
            resume,
            ema_decay:         self.ema_decay,
            dropout:           self.dropout,
            log_interval:      self.log_interval,
            snapshot_interval: self.snapshot_interval,
            log_dir:           self.log_dir,
        }
    }
}

/// All arguments for the `test` command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Output file for similarity matrices and predicted spans
    #[arg(long, default_value = "./prediction_results.json")]
    pub predictions: String,
}

impl TestArgs {
    pub fn into_config(self, data: DataArgs) -> TestConfig {
        TestConfig {
            data:        data.into(),
            predictions: self.predictions,
        }
    }
}
