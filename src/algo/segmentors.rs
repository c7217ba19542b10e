//! Reference image segmentors.
//!
//! - `threshold`: binary threshold on intensity.
//! - `weight_file`: threshold loaded from a weight file; without a usable file
//!   it passes images through unchanged.
//! - `script`: per-pixel Rhai expression over `p` (the input intensity).

use crate::algo::{AlgoError, AlgoResult, Algorithm, ImageSegmentor};
use crate::config::ConfigBlock;
use crate::types::ImageFrame;
use image::Luma;
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};
use std::path::{Path, PathBuf};

fn ensure_not_empty(image: &ImageFrame) -> AlgoResult<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AlgoError::Processing("cannot segment an empty image".into()));
    }
    Ok(())
}

fn binarize(image: &ImageFrame, threshold: u8, invert: bool) -> ImageFrame {
    let mut out = image.clone();
    for Luma([p]) in out.pixels_mut() {
        let on = (*p > threshold) != invert;
        *p = if on { 255 } else { 0 };
    }
    out
}

// ─── Threshold ───

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSegmentor {
    threshold: u8,
    invert: bool,
}

impl Default for ThresholdSegmentor {
    fn default() -> Self {
        Self {
            threshold: 128,
            invert: false,
        }
    }
}

impl ThresholdSegmentor {
    pub fn new(threshold: u8, invert: bool) -> Self {
        Self { threshold, invert }
    }
}

impl Algorithm for ThresholdSegmentor {
    fn type_name(&self) -> &'static str {
        "threshold"
    }

    fn get_configuration(&self) -> ConfigBlock {
        ConfigBlock::new()
            .with("threshold", self.threshold)
            .with("invert", self.invert)
    }

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()> {
        self.threshold = config.get_or("threshold", self.threshold)?;
        self.invert = config.get_or("invert", self.invert)?;
        Ok(())
    }

    fn check_configuration(&self, config: &ConfigBlock) -> bool {
        config.get_or("threshold", self.threshold).is_ok()
            && config.get_or("invert", self.invert).is_ok()
    }
}

impl ImageSegmentor for ThresholdSegmentor {
    fn segment(&mut self, image: &ImageFrame) -> AlgoResult<ImageFrame> {
        ensure_not_empty(image)?;
        Ok(binarize(image, self.threshold, self.invert))
    }
}

// ─── Weight file ───

/// Threshold read from a text file whose first token is the cut-off (0-255).
#[derive(Debug, Clone, Default)]
pub struct WeightFileSegmentor {
    weight_file: Option<PathBuf>,
    /// `None` means pass-through.
    threshold: Option<u8>,
}

impl WeightFileSegmentor {
    fn read_threshold(path: &Path) -> AlgoResult<Option<u8>> {
        let content = std::fs::read_to_string(path)?;
        match content.split_whitespace().next() {
            None => Ok(None),
            Some(token) => token.parse::<u8>().map(Some).map_err(|_| {
                AlgoError::InvalidConfiguration(format!(
                    "weight file {} does not start with a threshold: '{}'",
                    path.display(),
                    token
                ))
            }),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.threshold.is_none()
    }
}

impl Algorithm for WeightFileSegmentor {
    fn type_name(&self) -> &'static str {
        "weight_file"
    }

    fn get_configuration(&self) -> ConfigBlock {
        let path = self
            .weight_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        ConfigBlock::new().with("weight_file", path)
    }

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()> {
        let path = config.get_str("weight_file").unwrap_or_default().trim();
        if path.is_empty() {
            tracing::warn!("No weight file configured; segmentor passes images through");
            self.weight_file = None;
            self.threshold = None;
            return Ok(());
        }
        let path = PathBuf::from(path);
        if !path.is_file() {
            tracing::warn!(
                "Weight file {} not found; segmentor passes images through",
                path.display()
            );
            self.threshold = None;
        } else {
            self.threshold = Self::read_threshold(&path)?;
            if self.threshold.is_none() {
                tracing::warn!(
                    "Weight file {} is empty; segmentor passes images through",
                    path.display()
                );
            }
        }
        self.weight_file = Some(path);
        Ok(())
    }

    fn check_configuration(&self, config: &ConfigBlock) -> bool {
        let path = config.get_str("weight_file").unwrap_or_default().trim();
        !path.is_empty() && matches!(Self::read_threshold(Path::new(path)), Ok(Some(_)))
    }
}

impl ImageSegmentor for WeightFileSegmentor {
    fn segment(&mut self, image: &ImageFrame) -> AlgoResult<ImageFrame> {
        ensure_not_empty(image)?;
        Ok(match self.threshold {
            Some(t) => binarize(image, t, false),
            None => image.clone(),
        })
    }
}

// ─── Script ───

/// Evaluates an expression once per possible intensity at configuration time
/// and applies the resulting lookup table.
pub struct ScriptSegmentor {
    engine: Engine,
    expression: String,
    ast: Option<AST>,
    lut: Option<[u8; 256]>,
}

impl ScriptSegmentor {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(1_000);
        engine.register_fn("clamp", clamp_int);
        engine.register_fn("clamp", clamp_float);
        Self {
            engine,
            expression: "p".to_string(),
            ast: None,
            lut: None,
        }
    }

    fn compile(&self, source: &str) -> AlgoResult<AST> {
        self.engine
            .compile_expression(source)
            .map_err(|e| AlgoError::Script(format!("Compile error: {}", e)))
    }

    fn eval(&self, ast: &AST, p: u8) -> AlgoResult<u8> {
        let mut scope = Scope::new();
        scope.push("p", i64::from(p));
        let v = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(|e| AlgoError::Script(format!("Execution error at p={}: {}", p, e)))?;
        let value = if let Ok(f) = v.as_float() {
            f
        } else if let Ok(i) = v.as_int() {
            i as f64
        } else if let Ok(b) = v.as_bool() {
            if b {
                255.0
            } else {
                0.0
            }
        } else {
            return Err(AlgoError::Script(format!(
                "Expression must return a number or bool, got {}",
                v.type_name()
            )));
        };
        Ok(value.round().clamp(0.0, 255.0) as u8)
    }

    fn build_lut(&self, ast: &AST) -> AlgoResult<[u8; 256]> {
        let mut lut = [0u8; 256];
        for (p, slot) in lut.iter_mut().enumerate() {
            *slot = self.eval(ast, p as u8)?;
        }
        Ok(lut)
    }
}

// The std `clamp` panics on inverted or NaN bounds; scripts get an error instead.
fn clamp_int(v: i64, lo: i64, hi: i64) -> Result<i64, Box<EvalAltResult>> {
    if lo > hi {
        return Err(format!("clamp: lower bound {} exceeds upper bound {}", lo, hi).into());
    }
    Ok(v.clamp(lo, hi))
}

fn clamp_float(v: f64, lo: f64, hi: f64) -> Result<f64, Box<EvalAltResult>> {
    if lo.is_nan() || hi.is_nan() || lo > hi {
        return Err(format!("clamp: invalid bounds {} and {}", lo, hi).into());
    }
    Ok(v.clamp(lo, hi))
}

impl Default for ScriptSegmentor {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for ScriptSegmentor {
    fn type_name(&self) -> &'static str {
        "script"
    }

    fn get_configuration(&self) -> ConfigBlock {
        ConfigBlock::new().with("expression", &self.expression)
    }

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()> {
        let expression = config
            .get_str("expression")
            .unwrap_or(self.expression.as_str())
            .to_string();
        let ast = self.compile(&expression)?;
        self.lut = Some(self.build_lut(&ast)?);
        self.ast = Some(ast);
        self.expression = expression;
        Ok(())
    }

    fn check_configuration(&self, config: &ConfigBlock) -> bool {
        let expression = config.get_str("expression").unwrap_or(self.expression.as_str());
        self.compile(expression).is_ok()
    }
}

impl ImageSegmentor for ScriptSegmentor {
    fn segment(&mut self, image: &ImageFrame) -> AlgoResult<ImageFrame> {
        ensure_not_empty(image)?;
        let lut = self
            .lut
            .ok_or_else(|| AlgoError::Script("segmentor used before configuration".into()))?;
        let mut out = image.clone();
        for Luma([p]) in out.pixels_mut() {
            *p = lut[usize::from(*p)];
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ScriptSegmentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSegmentor")
            .field("expression", &self.expression)
            .field("compiled", &self.ast.is_some())
            .finish()
    }
}
