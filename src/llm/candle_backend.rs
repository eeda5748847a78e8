//! Candle backend for the local tier.
//!
//! Loads a Llama-architecture causal LM from the HuggingFace Hub and samples
//! with top-p. Files are cached under ~/.cache/huggingface after the first
//! download.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig};
use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::LlmError;
use crate::llm::provider::{LocalModel, LocalModelLoader, SamplingParams};

const EOS_TOKEN: &str = "</s>";

/// Loads [`CandleLlama`] for a hub model id.
pub struct CandleLoader {
    model_id: String,
}

impl CandleLoader {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl LocalModelLoader for CandleLoader {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn load(&self) -> std::result::Result<Arc<dyn LocalModel>, LlmError> {
        let model = CandleLlama::load(&self.model_id).map_err(|e| LlmError::LocalLoadFailed {
            model: self.model_id.clone(),
            reason: format!("{e:#}"),
        })?;
        Ok(Arc::new(model))
    }
}

/// Llama model, tokenizer and device. Forward passes take `&self`; each
/// generation gets its own KV cache.
pub struct CandleLlama {
    model: Llama,
    config: Config,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: Option<u32>,
}

impl CandleLlama {
    pub fn load(model_id: &str) -> Result<Self> {
        info!("Loading local model: {}", model_id);

        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.model(model_id.to_string());

        let config_path = repo
            .get("config.json")
            .context("Failed to download config.json")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer.json")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model.safetensors")?;

        let llama_config: LlamaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).context("Failed to read config.json")?,
        )
        .context("Failed to parse config.json")?;
        let config = llama_config.into_config(false);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let eos_token_id = tokenizer.token_to_id(EOS_TOKEN);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = Llama::load(vb, &config).context("Failed to build Llama model")?;

        info!("Local model loaded: {}", model_id);

        Ok(Self {
            model,
            config,
            tokenizer,
            device,
            eos_token_id,
        })
    }

    fn sample(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        let mut tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?
            .get_ids()
            .to_vec();
        let prompt_len = tokens.len();

        let mut cache = Cache::new(true, DType::F32, &self.config, &self.device)?;
        let mut logits_processor = LogitsProcessor::new(
            rand::random::<u64>(),
            Some(sampling.temperature),
            Some(sampling.top_p),
        );

        let mut index_pos = 0;
        for step in 0..sampling.max_tokens as usize {
            // Full prompt on the first pass, then one token at a time against the KV cache.
            let context_size = if step > 0 { 1 } else { tokens.len() };
            let context = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?;
            let logits = logits.squeeze(0)?;
            index_pos += context.len();

            let next = logits_processor.sample(&logits)?;
            if Some(next) == self.eos_token_id {
                break;
            }
            tokens.push(next);
        }

        debug!(
            prompt_tokens = prompt_len,
            generated_tokens = tokens.len() - prompt_len,
            "Local generation finished"
        );

        self.tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow!("Decoding failed: {}", e))
    }
}

impl LocalModel for CandleLlama {
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingParams,
    ) -> std::result::Result<String, LlmError> {
        self.sample(prompt, sampling)
            .map_err(|e| LlmError::LocalGenerationFailed(format!("{e:#}")))
    }
}
