use thiserror::Error;

/// Engine configuration. Built with [`EngineConfigBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    enable_compilation: bool,
    hot_threshold: u64,
    cache_capacity: usize,
    max_region_blocks: usize,
    count_instructions: bool,
    fold_constants: bool,
    split_blocks: bool,
    allow_indirect_jumps: bool,
    allow_fp: bool,
    allow_mixed_precision: bool,
    dump_ir: bool,
}

impl EngineConfig {
    pub fn enable_compilation(&self) -> bool {
        self.enable_compilation
    }

    /// Number of executions of a block after which a region is built from it.
    pub fn hot_threshold(&self) -> u64 {
        self.hot_threshold
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn max_region_blocks(&self) -> usize {
        self.max_region_blocks
    }

    pub fn count_instructions(&self) -> bool {
        self.count_instructions
    }

    pub fn fold_constants(&self) -> bool {
        self.fold_constants
    }

    pub fn split_blocks(&self) -> bool {
        self.split_blocks
    }

    pub fn allow_indirect_jumps(&self) -> bool {
        self.allow_indirect_jumps
    }

    pub fn allow_fp(&self) -> bool {
        self.allow_fp
    }

    pub fn allow_mixed_precision(&self) -> bool {
        self.allow_mixed_precision
    }

    pub fn dump_ir(&self) -> bool {
        self.dump_ir
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let builder = EngineConfigBuilder::default();
        Self {
            enable_compilation: builder.enable_compilation,
            hot_threshold: builder.hot_threshold,
            cache_capacity: builder.cache_capacity,
            max_region_blocks: builder.max_region_blocks,
            count_instructions: builder.count_instructions,
            fold_constants: builder.fold_constants,
            split_blocks: builder.split_blocks,
            allow_indirect_jumps: builder.allow_indirect_jumps,
            allow_fp: builder.allow_fp,
            allow_mixed_precision: builder.allow_mixed_precision,
            dump_ir: builder.dump_ir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    enable_compilation: bool,
    hot_threshold: u64,
    cache_capacity: usize,
    max_region_blocks: usize,
    count_instructions: bool,
    fold_constants: bool,
    split_blocks: bool,
    allow_indirect_jumps: bool,
    allow_fp: bool,
    allow_mixed_precision: bool,
    dump_ir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the hot threshold must be at least 1")]
    ZeroHotThreshold,
    #[error("the region cache must hold at least one region")]
    ZeroCacheCapacity,
    #[error("regions must be allowed at least one block")]
    ZeroRegionBlocks,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            enable_compilation: true,
            hot_threshold: 500,
            cache_capacity: 8,
            max_region_blocks: 64,
            count_instructions: true,
            fold_constants: true,
            split_blocks: true,
            allow_indirect_jumps: true,
            allow_fp: true,
            allow_mixed_precision: true,
            dump_ir: false,
        }
    }
}

impl EngineConfigBuilder {
    /// Compilation on, every optimization and region feature enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret only, never build regions.
    pub fn interpret_only(mut self) -> Self {
        self.enable_compilation = false;
        self
    }

    pub fn enable_compilation(mut self, enable: bool) -> Self {
        self.enable_compilation = enable;
        self
    }

    pub fn hot_threshold(mut self, threshold: u64) -> Self {
        self.hot_threshold = threshold;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn max_region_blocks(mut self, blocks: usize) -> Self {
        self.max_region_blocks = blocks;
        self
    }

    /// Keep the guest instruction counter up to date in compiled code
    pub fn count_instructions(mut self, count: bool) -> Self {
        self.count_instructions = count;
        self
    }

    /// Set const folding
    pub fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn split_blocks(mut self, split: bool) -> Self {
        self.split_blocks = split;
        self
    }

    pub fn allow_indirect_jumps(mut self, allow: bool) -> Self {
        self.allow_indirect_jumps = allow;
        self
    }

    pub fn allow_fp(mut self, allow: bool) -> Self {
        self.allow_fp = allow;
        self
    }

    pub fn allow_mixed_precision(mut self, allow: bool) -> Self {
        self.allow_mixed_precision = allow;
        self
    }

    pub fn dump_ir(mut self, dump: bool) -> Self {
        self.dump_ir = dump;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if self.hot_threshold == 0 {
            return Err(ConfigError::ZeroHotThreshold);
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if self.max_region_blocks == 0 {
            return Err(ConfigError::ZeroRegionBlocks);
        }
        Ok(EngineConfig {
            enable_compilation: self.enable_compilation,
            hot_threshold: self.hot_threshold,
            cache_capacity: self.cache_capacity,
            max_region_blocks: self.max_region_blocks,
            count_instructions: self.count_instructions,
            fold_constants: self.fold_constants,
            split_blocks: self.split_blocks,
            allow_indirect_jumps: self.allow_indirect_jumps,
            allow_fp: self.allow_fp,
            allow_mixed_precision: self.allow_mixed_precision,
            dump_ir: self.dump_ir,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config = EngineConfigBuilder::new().build().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.enable_compilation());
        assert!(config.split_blocks());
        assert_eq!(config.hot_threshold(), 500);
        assert_eq!(config.cache_capacity(), 8);
        assert!(!config.dump_ir());
    }

    #[test]
    fn rejects_zero_limits() {
        assert_eq!(
            EngineConfigBuilder::new().hot_threshold(0).build(),
            Err(ConfigError::ZeroHotThreshold)
        );
        assert_eq!(
            EngineConfigBuilder::new().cache_capacity(0).build(),
            Err(ConfigError::ZeroCacheCapacity)
        );
        assert_eq!(
            EngineConfigBuilder::new().max_region_blocks(0).build(),
            Err(ConfigError::ZeroRegionBlocks)
        );
    }
}
