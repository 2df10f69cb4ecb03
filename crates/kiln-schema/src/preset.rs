use serde::Serialize;

/// A built-in starter manifest for `kiln init`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub manifest: &'static str,
}

pub const BUILTIN_PRESETS: &[Preset] = &[
    Preset {
        name: "minimal",
        description: "Single base module with one verify check",
        manifest: r#"manifest_version = 1

[[modules]]
id = "base.system"
description = "Base system packages"
phase = 0
run_as = "root"
install = [
  "apt-get update",
  "apt-get install -y curl git ca-certificates",
]
installed_check = "command -v curl && command -v git"
verify = "command -v curl && command -v git"
"#,
    },
    Preset {
        name: "workstation",
        description: "Base system, data layout, language runtimes, and a coding agent",
        manifest: r#"manifest_version = 1

[[modules]]
id = "base.system"
description = "Base system packages"
phase = 0
run_as = "root"
install = [
  "apt-get update",
  "apt-get install -y curl git jq unzip ca-certificates",
]
installed_check = "command -v curl && command -v jq"
verify = ["command -v curl", "command -v git", "command -v jq"]

[[modules]]
id = "filesystem.data"
description = "Data root and project directories"
phase = 0
run_as = "root"
dependencies = ["base.system"]
verify = [
  "test -d /data/projects",
  { run = "test -d /data/cache", description = "Cache directory", optional = true },
]

[[modules]]
id = "lang.bun"
description = "Bun JavaScript runtime"
dependencies = ["base.system"]
tags = ["runtime", "js"]
install = "curl -fsSL https://bun.sh/install | bash"
installed_check = "test -x \"$HOME/.bun/bin/bun\""
verify = """
export PATH="$HOME/.bun/bin:$PATH"
bun --version
"""

[[modules]]
id = "lang.uv"
description = "uv Python toolchain"
dependencies = ["base.system"]
tags = ["runtime", "python"]
install = "curl -LsSf https://astral.sh/uv/install.sh | sh"
installed_check = "test -x \"$HOME/.local/bin/uv\""
verify = "\"$HOME/.local/bin/uv\" --version"

[[modules]]
id = "agents.codex"
description = "Codex CLI coding agent"
phase = 2
dependencies = ["lang.bun"]
tags = ["agent"]
install = "\"$HOME/.bun/bin/bun\" install -g @openai/codex"
verify = { run = "command -v codex", description = "codex on PATH", optional = true }

[[modules]]
id = "tools.atuin"
description = "Shell history search"
enabled_by_default = false
dependencies = ["base.system"]
tags = ["shell"]
install = "curl --proto '=https' --tlsv1.2 -LsSf https://setup.atuin.sh | sh"
verify = "command -v atuin"
"#,
    },
];

pub fn get_preset(name: &str) -> Option<&'static Preset> {
    BUILTIN_PRESETS.iter().find(|p| p.name == name)
}

pub fn list_presets() -> &'static [Preset] {
    BUILTIN_PRESETS
}
