//! Host architecture mapping
//!
//! Release artifacts are addressed by version + architecture, and the
//! artifact naming scheme differs from what `uname -m` reports. The
//! mapping is total: unknown values pass through unchanged.

/// Map a `uname -m` value to the artifact architecture name
pub fn map_arch(uname_machine: &str) -> String {
    match uname_machine.trim() {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        "armv7l" => "arm-v7".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_architectures() {
        assert_eq!(map_arch("x86_64"), "amd64");
        assert_eq!(map_arch("aarch64"), "arm64");
        assert_eq!(map_arch("armv7l"), "arm-v7");
    }

    #[test]
    fn test_unknown_architecture_passes_through() {
        assert_eq!(map_arch("riscv64"), "riscv64");
        assert_eq!(map_arch("s390x"), "s390x");
    }

    #[test]
    fn test_uname_output_is_trimmed() {
        assert_eq!(map_arch("x86_64\n"), "amd64");
    }
}
