//! Candle runtime for the local generator.
//!
//! Runs GGUF-quantized chat models on the CPU via
//! [Candle](https://github.com/huggingface/candle). Weights and tokenizers
//! come from the HuggingFace Hub and are cached by `hf-hub`.
//!
//! `model_name` is either a preset alias (`smollm:360m`, `tinyllama`,
//! `qwen:0.5b`, ...) or a path to a `.gguf` file with a `tokenizer.json`
//! next to it.

use crate::local::{EngineLoader, LocalEngine};
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama as qlm;
use complimenter_core::error::ProviderError;
use hf_hub::api::sync::Api;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokenizers::Tokenizer;
use tracing::{debug, info};

const TEMPERATURE: f64 = 0.8;
const TOP_P: f64 = 0.95;

/// Chat template used to wrap the prompt as a single user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatTemplate {
    /// `<|user|>\n{content}</s>\n<|assistant|>\n`
    TinyLlama,
    /// `<|im_start|>user\n{content}<|im_end|>\n<|im_start|>assistant\n`
    ChatML,
}

impl ChatTemplate {
    fn wrap(self, prompt: &str) -> String {
        match self {
            ChatTemplate::TinyLlama => format!("<|user|>\n{prompt}</s>\n<|assistant|>\n"),
            ChatTemplate::ChatML => {
                format!("<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n")
            }
        }
    }
}

struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
    chat_template: ChatTemplate,
}

const PRESET_NAMES: &str = "tinyllama, smollm:135m, smollm:360m, smollm:1.7b, qwen:0.5b, qwen:1.5b";

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
            chat_template: ChatTemplate::TinyLlama,
        }),
        "smollm" | "smollm:135m" | "smollm-135m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
            gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "smollm:1.7b" | "smollm-1.7b" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
            gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "qwen:1.5b" | "qwen-1.5b" | "qwen2-1.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-1.5B-Instruct-GGUF",
            gguf_file: "qwen2-1_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-1.5B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        _ => None,
    }
}

/// Loads GGUF models through Candle.
pub struct CandleLoader;

impl EngineLoader for CandleLoader {
    fn load(&self, model_name: &str) -> Result<Box<dyn LocalEngine>, ProviderError> {
        let engine = if model_name.ends_with(".gguf") && Path::new(model_name).exists() {
            CandleEngine::load_from_path(Path::new(model_name))?
        } else {
            CandleEngine::load_preset(model_name)?
        };
        Ok(Box::new(engine))
    }
}

/// A loaded quantized llama-family model.
struct CandleEngine {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    chat_template: ChatTemplate,
    eos_token_id: u32,
}

impl CandleEngine {
    fn load_preset(model_name: &str) -> Result<Self, ProviderError> {
        let preset = resolve_preset(model_name).ok_or_else(|| {
            ProviderError::ModelUnavailable(format!(
                "Unknown local model '{model_name}'. Available presets: {PRESET_NAMES}. \
                 Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        let api = Api::new().map_err(|e| {
            ProviderError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        Self::load_files(&model_path, &tokenizer_path, preset.chat_template)
    }

    fn load_from_path(path: &Path) -> Result<Self, ProviderError> {
        let tokenizer_path = path.with_file_name("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(ProviderError::ModelUnavailable(format!(
                "No tokenizer.json next to {}",
                path.display()
            )));
        }
        Self::load_files(path, &tokenizer_path, ChatTemplate::ChatML)
    }

    fn load_files(
        model_path: &Path,
        tokenizer_path: &Path,
        chat_template: ChatTemplate,
    ) -> Result<Self, ProviderError> {
        info!(path = %model_path.display(), "Loading local GGUF model");
        let device = Device::Cpu;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ProviderError::ModelUnavailable(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(model_path)
            .map_err(|e| ProviderError::ModelUnavailable(format!("Failed to open model file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| ProviderError::ModelUnavailable(format!("Failed to parse GGUF file: {e}")))?;

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, &device).map_err(|e| {
            ProviderError::ModelUnavailable(format!("Failed to load model weights: {e}"))
        })?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .unwrap_or(2);

        info!(eos_token_id, "Local model loaded successfully");

        Ok(Self {
            model,
            tokenizer,
            device,
            chat_template,
            eos_token_id,
        })
    }
}

impl LocalEngine for CandleEngine {
    /// Returns only the newly generated tokens.
    fn generate(&mut self, prompt: &str, max_new_tokens: u32) -> Result<String, ProviderError> {
        let wrapped = self.chat_template.wrap(prompt);
        let encoding = self
            .tokenizer
            .encode(wrapped, true)
            .map_err(|e| ProviderError::ModelUnavailable(format!("Tokenization failed: {e}")))?;
        let prompt_tokens = encoding.get_ids();

        debug!(
            prompt_tokens = prompt_tokens.len(),
            max_new_tokens, "Starting local generation"
        );

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42);
        let mut logits_processor = LogitsProcessor::from_sampling(
            seed,
            Sampling::TopP {
                p: TOP_P,
                temperature: TEMPERATURE,
            },
        );

        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut position = 0;
        let mut generated: Vec<u32> = Vec::new();

        for _ in 0..max_new_tokens {
            let logits = self.model.forward(&input, position).map_err(map_candle_err)?;
            position += input.dim(1).map_err(map_candle_err)?;

            let logits = logits.squeeze(0).map_err(map_candle_err)?;
            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next_token == self.eos_token_id {
                break;
            }
            generated.push(next_token);

            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let output = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| ProviderError::ModelUnavailable(format!("Detokenization failed: {e}")))?;

        debug!(completion_tokens = generated.len(), "Generation complete");

        Ok(output
            .trim()
            .trim_end_matches("</s>")
            .trim_end_matches("<|im_end|>")
            .to_string())
    }
}

fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::ModelUnavailable(format!("Candle inference error: {e}"))
}
