use anyhow::Result;
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Rectangular region in the original frame.
#[derive(Debug, Clone)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Metadata value types carried alongside each pipeline item.
#[derive(Debug, Clone)]
pub enum MetaValue {
    Bool(bool),
    Float(f32),
    Int(i32),
    Text(String),
}

/// Data that flows through the analysis pipeline.
///
/// Each item is either the full frame or a single candidate region split off
/// by a stage, with the original frame shared via Arc.
#[derive(Clone)]
pub struct StageData {
    /// Current working image (full frame or cropped region).
    pub image: DynamicImage,

    /// The original frame, shared across all items.
    pub original: Arc<DynamicImage>,

    /// Region in the original frame (None means full frame).
    pub region: Option<Region>,

    /// Per-item properties accumulated by stages.
    pub metadata: HashMap<String, MetaValue>,
}

impl StageData {
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            region: None,
            metadata: HashMap::new(),
        }
    }

    pub fn from_region(image: DynamicImage, original: Arc<DynamicImage>, region: Region) -> Self {
        Self {
            image,
            original,
            region: Some(region),
            metadata: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: MetaValue) {
        self.metadata.insert(key.into(), value);
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetaValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetaValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.metadata.get(key) {
            Some(MetaValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Debug configuration: when enabled every stage dumps its outputs as images.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: std::path::PathBuf,
    pub enabled: bool,
}

/// Context available to all pipeline stages.
#[derive(Clone, Default)]
pub struct StageContext {
    pub debug: Option<DebugConfig>,
}

/// A single transform in the analysis pipeline.
///
/// Stages can split items (1 -> many), filter (many -> fewer), or transform
/// in place (many -> many).
pub trait PipelineStage: Send + Sync {
    fn process(&self, data: Vec<StageData>, context: &StageContext) -> Result<Vec<StageData>>;

    /// Human-readable name, used for debug output directories.
    fn name(&self) -> &str;
}

/// Composable image-analysis pipeline.
pub struct Pipeline {
    stages: Vec<Arc<dyn PipelineStage>>,
    context: StageContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            context: StageContext::default(),
        }
    }

    /// Enable debug mode. The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: std::path::PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                anyhow::bail!("Debug directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    pub fn add_stage(mut self, stage: Arc<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_stage_boxed(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(Arc::from(stage));
        self
    }

    /// Run all stages in order on an input frame.
    pub fn run(&self, input: DynamicImage) -> Result<Vec<StageData>> {
        self.save_debug_input(&input)?;

        let mut data = vec![StageData::from_image(input)];

        for (stage_idx, stage) in self.stages.iter().enumerate() {
            debug!(stage = stage.name(), items = data.len(), "running stage");

            data = stage.process(data, &self.context)?;
            self.save_debug_outputs(stage_idx, stage.name(), &data)?;

            debug!(stage = stage.name(), items = data.len(), "stage complete");
        }

        Ok(data)
    }

    fn save_debug_input(&self, input: &DynamicImage) -> Result<()> {
        if let Some(debug_config) = &self.context.debug {
            if debug_config.enabled {
                let input_dir = debug_config.output_dir.join("00_input");
                std::fs::create_dir_all(&input_dir)?;
                input
                    .save(input_dir.join("01.png"))
                    .map_err(|e| anyhow::anyhow!("Failed to save debug input: {}", e))?;
            }
        }
        Ok(())
    }

    fn save_debug_outputs(&self, stage_idx: usize, stage_name: &str, data: &[StageData]) -> Result<()> {
        if let Some(debug_config) = &self.context.debug {
            if debug_config.enabled {
                let stage_dir_name = format!(
                    "{:02}_{}",
                    stage_idx + 1,
                    stage_name.to_lowercase().replace(' ', "_")
                );
                let stage_dir = debug_config.output_dir.join(&stage_dir_name);
                std::fs::create_dir_all(&stage_dir)?;

                for (idx, item) in data.iter().enumerate() {
                    let output_path = stage_dir.join(format!("{:02}.png", idx + 1));
                    item.image
                        .save(&output_path)
                        .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
                }

                debug!(stage = stage_name, count = data.len(), dir = %stage_dir.display(), "debug images saved");
            }
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
