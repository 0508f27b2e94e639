use clap::{Parser, Subcommand};
use prognos::data::load_training_data;
use prognos::labels::LabelEncoder;
use prognos::model::ModelBundle;
use prognos::server::{self, ServiceState};
use prognos::train::{TrainConfig, cross_validate, fit};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "prognos",
    version,
    about = "Train and serve a symptom-to-disease classifier",
    long_about = "Trains a one-vs-rest linear SVM on a labeled symptom dataset and serves \
                  ranked disease predictions over HTTP."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier from a labeled symptom dataset
    #[command(
        about = "Train the classifier (outputs: classifier.toml, feature_names.toml, label_encoder.toml)"
    )]
    Train {
        /// Path to the training CSV: one column per symptom plus the label column
        training_data: String,

        /// Name of the label column
        #[arg(long, default_value = "Disease_name")]
        label_column: String,

        /// Directory the artifact bundle is written to
        #[arg(long, default_value = "model_files")]
        model_dir: PathBuf,
    },

    /// Serve the trained classifier over HTTP
    #[command(about = "Serve ranked predictions (GET /, POST /predict)")]
    Serve {
        /// Directory holding the artifact bundle
        #[arg(long, default_value = "model_files")]
        model_dir: PathBuf,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to bind
        #[arg(long, default_value_t = 5000)]
        port: u16,

        /// Number of ranked predictions returned per request
        #[arg(long, default_value_t = 3)]
        top_n: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Train {
            training_data,
            label_column,
            model_dir,
        } => train_command(&training_data, &label_column, &model_dir),
        Commands::Serve {
            model_dir,
            host,
            port,
            top_n,
        } => serve_command(&model_dir, host, port, top_n),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn train_command(
    training_data_path: &str,
    label_column: &str,
    model_dir: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading training data from: {}", training_data_path);
    let data = load_training_data(training_data_path, label_column)?;
    println!(
        "Loaded {} samples with {} symptom features",
        data.x.nrows(),
        data.feature_names.len()
    );

    println!("Encoding target variable...");
    let encoder = LabelEncoder::fit(&data.labels)?;
    let y = encoder.transform_all(&data.labels)?;
    println!("Number of classes: {}", encoder.len());

    let config = TrainConfig::default();

    println!("Performing {}-fold cross-validation...", config.folds);
    let report = cross_validate(data.x.view(), &y, encoder.len(), &config)?;
    println!(
        "Cross-validation accuracy scores: {:?}",
        report.fold_accuracies
    );
    println!(
        "Mean CV accuracy: {:.4} (± {:.4})",
        report.mean(),
        report.std_dev()
    );

    // The final fit reuses every row; the CV figures above are the only
    // accuracy estimate the deployed artifact gets.
    println!("Training final model on the entire dataset...");
    let classifier = fit(data.x.view(), &y, encoder.len(), &config)?;

    let bundle = ModelBundle {
        classifier,
        feature_names: data.feature_names,
        encoder,
    };
    bundle.save(model_dir)?;
    println!("Artifact bundle saved to: {}", model_dir.display());

    Ok(())
}

fn serve_command(
    model_dir: &std::path::Path,
    host: IpAddr,
    port: u16,
    top_n: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = match ModelBundle::load(model_dir) {
        Ok(bundle) => {
            println!(
                "Loaded model bundle from {} ({} features, {} classes)",
                model_dir.display(),
                bundle.feature_names.len(),
                bundle.encoder.len()
            );
            Some(bundle)
        }
        Err(err) => {
            log::error!(
                "Failed to load model artifacts from '{}': {err}",
                model_dir.display()
            );
            println!(
                "Starting degraded: model artifacts unavailable; /predict will fail until the \
                 bundle is trained and the service restarted."
            );
            None
        }
    };

    let state = Arc::new(ServiceState::new(bundle, top_n));
    let addr = SocketAddr::from((host, port));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(state, addr))?;
    Ok(())
}
