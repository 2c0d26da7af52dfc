use clap::Parser;
use detdecode::{
    BoxAdjust, BoxFormat, LabelNaming, LabelSource, Pipeline, PipelineConfig, SuppressionMode,
    TensorDescriptor, TensorShape,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Detector output decoder (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
    /// Print the metadata-muxer view instead of the result record.
    #[arg(long)]
    metamux: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LabelNamingConfig {
    Dotted,
    Raw,
}

impl From<LabelNamingConfig> for LabelNaming {
    fn from(value: LabelNamingConfig) -> Self {
        match value {
            LabelNamingConfig::Dotted => LabelNaming::Dotted,
            LabelNamingConfig::Raw => LabelNaming::Raw,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AdjustConfigJson {
    width_scale: f32,
    height_scale: f32,
    y_offset: f32,
    flip_x: bool,
    flip_y: bool,
}

impl Default for AdjustConfigJson {
    fn default() -> Self {
        let adj = BoxAdjust::default();
        Self {
            width_scale: adj.width_scale,
            height_scale: adj.height_scale,
            y_offset: adj.y_offset,
            flip_x: adj.flip_x,
            flip_y: adj.flip_y,
        }
    }
}

impl From<AdjustConfigJson> for BoxAdjust {
    fn from(value: AdjustConfigJson) -> Self {
        BoxAdjust {
            width_scale: value.width_scale,
            height_scale: value.height_scale,
            y_offset: value.y_offset,
            flip_x: value.flip_x,
            flip_y: value.flip_y,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PipelineConfigJson {
    confidence_threshold: f32,
    iou_threshold: f32,
    max_results: usize,
    suppression: String,
    output_format: String,
    label_naming: LabelNamingConfig,
    model: String,
    id_base: u32,
    adjust: AdjustConfigJson,
}

impl Default for PipelineConfigJson {
    fn default() -> Self {
        let cfg = PipelineConfig::default();
        Self {
            confidence_threshold: cfg.confidence_threshold,
            iou_threshold: cfg.iou_threshold,
            max_results: cfg.max_results,
            suppression: "class_agnostic".to_string(),
            output_format: cfg.output_format.as_str().to_string(),
            label_naming: LabelNamingConfig::Dotted,
            model: cfg.model,
            id_base: cfg.id_base,
            adjust: AdjustConfigJson::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    tensor_path: String,
    input_format: String,
    shape: [usize; 3],
    input_width: u32,
    input_height: u32,
    label_path: Option<String>,
    output_path: Option<String>,
    pipeline: PipelineConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tensor_path: String::new(),
            input_format: "FLOAT32".to_string(),
            shape: [1, 6300, 85],
            input_width: 320,
            input_height: 320,
            label_path: None,
            output_path: None,
            pipeline: PipelineConfigJson::default(),
        }
    }
}

fn pipeline_config(
    json: PipelineConfigJson,
    label_path: Option<String>,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let suppression: SuppressionMode = json.suppression.parse()?;
    let output_format: BoxFormat = json.output_format.parse()?;
    Ok(PipelineConfig {
        confidence_threshold: json.confidence_threshold,
        iou_threshold: json.iou_threshold,
        max_results: json.max_results,
        suppression,
        output_format,
        adjust: json.adjust.into(),
        label_source: label_path.map_or(LabelSource::BuiltIn, |p| LabelSource::Path(p.into())),
        label_naming: json.label_naming.into(),
        model: json.model,
        id_base: json.id_base,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("detdecode=debug".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.tensor_path.is_empty() {
        return Err("tensor_path must be set in the config".into());
    }

    let [batches, anchors, values] = config.shape;
    let shape = TensorShape::new(batches, anchors, values)?;
    let bytes = fs::read(&config.tensor_path)?;
    let desc = TensorDescriptor::from_bytes(&bytes, &config.input_format, shape)
        .with_input_size(config.input_width, config.input_height);

    let pipeline = Pipeline::new(pipeline_config(config.pipeline, config.label_path)?)?;
    let record = pipeline.process(&desc);
    let json = if cli.metamux {
        serde_json::to_string_pretty(&record.to_metamux())?
    } else {
        serde_json::to_string_pretty(&record)?
    };

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    if let detdecode::ResultRecord::Failure { stage, message, .. } = &record {
        return Err(format!("{stage} stage failed: {message}").into());
    }
    Ok(())
}
