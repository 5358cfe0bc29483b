mod config;
mod draft;
mod error;
mod form;
mod generator;
mod issue_date;
mod pdf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Assets;
use form::{GenerationStatus, PrescriptionForm};
use generator::PrescriptionGenerator;

/// Fill the prescription template and save it as a PDF.
#[derive(Parser, Debug)]
#[command(name = "prescription_pdf")]
#[command(about = "Fill the prescription template and save it as a PDF.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Overlay the three fields on the template and write
    /// receita_<name>_<timestamp>.pdf to the documents directory
    Generate {
        /// Patient name
        #[arg(long, default_value = "")]
        name: String,

        /// Prescription text, taken verbatim (line breaks included)
        #[arg(long, default_value = "")]
        prescription: String,

        /// Issue date text, defaults to today (e.g. "15 de Março de 2024")
        #[arg(long)]
        date: Option<String>,

        /// Directory containing prescription.pdf and an optional layout.json
        #[arg(short, long, default_value = "assets")]
        assets_dir: PathBuf,

        /// Directory the generated PDF is saved in
        #[arg(short, long, default_value = ".")]
        documents_dir: PathBuf,
    },

    /// Write the default prescription template
    Template {
        #[arg(short, long, default_value = "assets/prescription.pdf")]
        output: PathBuf,
    },
}

fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prescription_pdf=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

/// Set the form fields from the command line. Values are used as given.
fn fill_form(form: &mut PrescriptionForm, name: String, prescription: String, date: Option<String>) {
    form.set_issue_date(date.unwrap_or_else(issue_date::today_pt_br));
    form.set_patient_name(name);
    form.set_prescription_text(prescription);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Generate {
            name,
            prescription,
            date,
            assets_dir,
            documents_dir,
        } => {
            let assets = Assets::new(assets_dir);
            let generator = PrescriptionGenerator::from_assets(&assets)?;
            tracing::info!("Using template {:?}", generator.template_path());

            let mut form = PrescriptionForm::default();
            form.on_change(|view| {
                tracing::debug!(
                    draft = ?view.draft,
                    share = ?view.share_target(),
                    "form changed"
                );
            });
            fill_form(&mut form, name, prescription, date);
            tracing::info!("Generating prescription for {:?}", form.draft().patient_name);

            let now = chrono::Local::now().naive_local();
            form.generate(&generator, &documents_dir, now)
                .map_err(|e| anyhow!(e).context("Prescription was not generated"))?;

            match form.status() {
                GenerationStatus::Generated(path) => println!("{}", path.display()),
                status => tracing::warn!("Unexpected form status after generation: {:?}", status),
            }
            Ok(())
        }
        Command::Template { output } => {
            pdf::write_default_template(&output)?;
            println!("{}", output.display());
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging() {
        eprintln!("Error: failed to initialise logging: {}", e);
    }

    if let Err(e) = run(args.command) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
