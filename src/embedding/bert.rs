use candle::{DType, Device, Result, Tensor};
use candle_core as candle;
use candle_core::IndexOp;
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use std::path::Path;
use std::sync::Arc;
use tokenizers::Encoding;

fn read_config(model_dir: &Path) -> Result<Config> {
    let config_content = std::fs::read_to_string(model_dir.join("config.json"))?;
    serde_json::from_str(&config_content)
        .map_err(|e| candle::Error::Msg(format!("failed to parse config: {e}")))
}

fn mmap_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let weights_path = model_dir.join("model.safetensors");
    // SAFETY: the weights file is opened read-only and not modified while mapped.
    unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device) }
}

/// Sentence-transformers exports keep the encoder at the root, HF classifiers nest it.
fn load_backbone(vb: &VarBuilder, config: &Config) -> Result<BertModel> {
    if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("bert"), config)
    } else if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("roberta"), config)
    } else {
        BertModel::load(vb.clone(), config)
    }
}

/// Padded `[batch, seq]` tensors built from same-length encodings.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub type_ids: Tensor,
    pub attention_mask: Tensor,
}

impl BatchInputs {
    pub fn from_encodings(encodings: &[Encoding], device: &Device) -> Result<Self> {
        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.len()).unwrap_or(0);
        if encodings.iter().any(|e| e.len() != seq_len) {
            return Err(candle::Error::Msg(
                "encodings in one batch must be padded to the same length".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut types = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        for encoding in encodings {
            ids.extend_from_slice(encoding.get_ids());
            types.extend_from_slice(encoding.get_type_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        Ok(Self {
            input_ids: Tensor::from_vec(ids, (batch, seq_len), device)?,
            type_ids: Tensor::from_vec(types, (batch, seq_len), device)?,
            attention_mask: Tensor::from_vec(mask, (batch, seq_len), device)?,
        })
    }
}

struct BertForSequenceClassificationImpl {
    bert: BertModel,
    classifier: Linear,
}

/// Cross-encoder: BERT backbone plus a one-logit head over `[CLS]`.
#[derive(Clone)]
pub struct BertClassifier(Arc<BertForSequenceClassificationImpl>);

impl BertClassifier {
    pub fn load<P: AsRef<Path>>(model_dir: P, device: &Device) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let config = read_config(model_dir)?;
        let vb = mmap_weights(model_dir, device)?;

        let bert = load_backbone(&vb, &config)?;
        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))?;

        Ok(Self(Arc::new(BertForSequenceClassificationImpl {
            bert,
            classifier,
        })))
    }

    /// Returns logits of shape `[batch, 1]`.
    pub fn forward(&self, inputs: &BatchInputs) -> Result<Tensor> {
        let output = self.0.bert.forward(
            &inputs.input_ids,
            &inputs.type_ids,
            Some(&inputs.attention_mask),
        )?;
        let cls_token = output.i((.., 0, ..))?;
        self.0.classifier.forward(&cls_token)
    }
}

/// Bi-encoder: BERT backbone with masked mean pooling and L2 normalization.
#[derive(Clone)]
pub struct BertEncoder {
    bert: Arc<BertModel>,
    hidden_size: usize,
}

impl BertEncoder {
    pub fn load<P: AsRef<Path>>(model_dir: P, device: &Device) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let config = read_config(model_dir)?;
        let vb = mmap_weights(model_dir, device)?;
        let bert = load_backbone(&vb, &config)?;

        Ok(Self {
            bert: Arc::new(bert),
            hidden_size: config.hidden_size,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Returns unit-length sentence vectors of shape `[batch, hidden]`.
    pub fn forward(&self, inputs: &BatchInputs) -> Result<Tensor> {
        let hidden = self.bert.forward(
            &inputs.input_ids,
            &inputs.type_ids,
            Some(&inputs.attention_mask),
        )?;
        masked_mean_l2(&hidden, &inputs.attention_mask)
    }
}

/// Mean over non-padding positions, then L2 normalization.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask
        .to_device(hidden.device())?
        .to_dtype(hidden.dtype())?
        .unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let lengths = mask.sum(1)?.maximum(1e-9)?;
    let mean = summed.broadcast_div(&lengths)?;

    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;
    mean.broadcast_div(&norm)
}
