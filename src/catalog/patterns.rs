//! Built-in detection rule tables.
//!
//! Contains the regex, literal and structural rules for every threat
//! family:
//! - Code injection
//! - Template injection
//! - Cross-site scripting
//! - Command injection
//! - SQL injection
//! - Path traversal
//! - Sensitive data exposure
//! - Structural denial of service

use super::rules::StructuralCheck;
use super::{Severity, ThreatCategory};

/// A regex detection rule
#[derive(Debug, Clone)]
pub struct RulePattern {
    /// Rule name, unique within its category
    pub name: &'static str,
    /// Regex pattern
    pub pattern: &'static str,
    /// Threat category
    pub category: ThreatCategory,
    /// Severity
    pub severity: Severity,
    /// Message reported with each match
    pub message: &'static str,
    /// Safe to remove textually during sanitization
    pub strippable: bool,
}

/// A case-insensitive substring rule
#[derive(Debug, Clone)]
pub struct RuleLiteral {
    /// Rule name
    pub name: &'static str,
    /// Literal text
    pub literal: &'static str,
    /// Threat category
    pub category: ThreatCategory,
    /// Severity
    pub severity: Severity,
    /// Message reported with each match
    pub message: &'static str,
}

/// A structural limit rule
#[derive(Debug, Clone)]
pub struct RuleStructural {
    /// Rule name
    pub name: &'static str,
    /// Check performed by the validator
    pub check: StructuralCheck,
    /// Severity
    pub severity: Severity,
    /// Message prefix
    pub message: &'static str,
}

/// Code injection patterns
pub static CODE_INJECTION_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "eval_call",
        pattern: r"(?i)\beval\s*\(",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Critical,
        message: "Direct call to eval()",
        strippable: false,
    },
    RulePattern {
        name: "function_constructor",
        pattern: r"\b(?:new\s+)?Function\s*\(",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Critical,
        message: "Dynamic function construction",
        strippable: false,
    },
    RulePattern {
        name: "string_timer",
        pattern: r#"\bset(?:Timeout|Interval|Immediate)\s*\(\s*["'`]"#,
        category: ThreatCategory::CodeInjection,
        severity: Severity::High,
        message: "Timer invoked with a code string",
        strippable: false,
    },
    RulePattern {
        name: "dynamic_require",
        pattern: r#"\brequire\s*\(\s*(?:["'`]|[\w.$]+\s*\))"#,
        category: ThreatCategory::CodeInjection,
        severity: Severity::High,
        message: "Module loading via require()",
        strippable: false,
    },
    RulePattern {
        name: "dynamic_import",
        pattern: r#"\bimport\s*\(\s*["'`\w]"#,
        category: ThreatCategory::CodeInjection,
        severity: Severity::High,
        message: "Dynamic module import",
        strippable: false,
    },
    RulePattern {
        name: "process_access",
        pattern: r"\bprocess\s*\.\s*(?:env|exit|binding|mainModule|kill|argv|cwd|dlopen)",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Critical,
        message: "Process/runtime introspection",
        strippable: false,
    },
    RulePattern {
        name: "exec_call",
        pattern: r"\b(?:exec|execSync|execFile|spawn|spawnSync)\s*\(",
        category: ThreatCategory::CodeInjection,
        severity: Severity::High,
        message: "Process execution primitive",
        strippable: false,
    },
    RulePattern {
        name: "python_runtime",
        pattern: r"\b(?:__import__\s*\(|os\s*\.\s*(?:system|popen|exec\w*)\s*\(|subprocess\s*\.\s*\w+\s*\()",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Critical,
        message: "Python runtime execution primitive",
        strippable: false,
    },
    RulePattern {
        name: "vm_run",
        pattern: r"\bvm\s*\.\s*run\w*\s*\(",
        category: ThreatCategory::CodeInjection,
        severity: Severity::High,
        message: "Sandbox escape via vm module",
        strippable: false,
    },
    RulePattern {
        name: "global_this",
        pattern: r"\bglobalThis",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Medium,
        message: "Access to the global object",
        strippable: false,
    },
];

/// Template injection patterns
pub static TEMPLATE_INJECTION_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "engine_internals",
        pattern: r"(?i)\{\{[^}]*?\b(?:constructor|__proto__|prototype|this|global|globalThis|process|self|request|session|config)\b[^}]*\}\}",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::Critical,
        message: "Template expression accesses engine internals",
        strippable: false,
    },
    RulePattern {
        name: "constructor_chain",
        pattern: r"\bconstructor\s*(?:\.\s*constructor|\[\s*['\x22]constructor)",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::Critical,
        message: "Constructor chain used to reach Function",
        strippable: false,
    },
    RulePattern {
        name: "prototype_pollution",
        pattern: r"__proto__|\bconstructor\s*\[\s*['\x22]prototype",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::High,
        message: "Prototype access",
        strippable: false,
    },
    RulePattern {
        name: "dunder_introspection",
        pattern: r"__(?:class|mro|subclasses|globals|builtins|init|base|bases|dict|import)__",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::Critical,
        message: "Python object introspection",
        strippable: false,
    },
    RulePattern {
        name: "arithmetic_expression",
        pattern: r"\{\{\s*\d+\s*[*+/-]\s*\d+\s*\}\}",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::Medium,
        message: "Arithmetic template expression",
        strippable: false,
    },
    RulePattern {
        name: "block_directive",
        pattern: r"\{%-?\s*(?:import|include|extends|load|macro|set|exec|debug)",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::High,
        message: "Template block directive",
        strippable: false,
    },
    RulePattern {
        name: "attr_filter",
        pattern: r"\|\s*attr\s*\(",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::High,
        message: "Attribute lookup filter",
        strippable: false,
    },
    RulePattern {
        name: "scriptlet",
        pattern: r"<%[=-]?[\s\S]*?%>",
        category: ThreatCategory::TemplateInjection,
        severity: Severity::High,
        message: "Embedded scriptlet",
        strippable: false,
    },
];

/// Cross-site scripting patterns
pub static XSS_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "script_tag",
        pattern: r"(?i)<\s*/?\s*script[^>]*>?",
        category: ThreatCategory::Xss,
        severity: Severity::Critical,
        message: "Script tag",
        strippable: true,
    },
    RulePattern {
        name: "dangerous_tag",
        pattern: r"(?i)<\s*(?:iframe|frame|object|embed|applet|svg|base|meta)",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Tag with executable semantics",
        strippable: true,
    },
    RulePattern {
        name: "stylesheet_link",
        pattern: r#"(?i)<\s*link\b[^>]*\brel\s*=\s*["']?\s*(?:stylesheet|import)"#,
        category: ThreatCategory::Xss,
        severity: Severity::Medium,
        message: "External stylesheet link",
        strippable: false,
    },
    RulePattern {
        name: "style_expression",
        pattern: r"(?i)<\s*style\b[^>]*>[^<]*(?:expression\s*\(|javascript\s*:|@import|behavior\s*:)",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Executable style block",
        strippable: false,
    },
    RulePattern {
        name: "event_handler_attribute",
        pattern: r"(?i)<[^>]*\son[a-z]+\s*=",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Inline event handler attribute",
        strippable: false,
    },
    RulePattern {
        name: "event_handler",
        pattern: r"(?i)\bon(?:abort|blur|change|click|dblclick|error|focus|input|keydown|keypress|keyup|load|mousedown|mousemove|mouseout|mouseover|mouseup|pageshow|pointerdown|reset|resize|scroll|select|submit|toggle|unload|animationstart|transitionend)\s*=",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Event handler assignment",
        strippable: false,
    },
    RulePattern {
        name: "javascript_uri",
        pattern: r"(?i)javascript\s*:",
        category: ThreatCategory::Xss,
        severity: Severity::Critical,
        message: "javascript: URI",
        strippable: true,
    },
    RulePattern {
        name: "vbscript_uri",
        pattern: r"(?i)vbscript\s*:",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "vbscript: URI",
        strippable: true,
    },
    RulePattern {
        name: "data_uri",
        pattern: r"(?i)data\s*:\s*(?:text/html|text/javascript|application/(?:x-)?javascript|image/svg\+xml)",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Executable data: URI",
        strippable: true,
    },
    RulePattern {
        name: "encoded_markup",
        pattern: r"(?i)(?:&#0*60;?|&#x0*3c;?|&lt;?|%3c|\\u003c|\\x3c)\s*/?\s*(?:script|iframe|svg|img|object|embed)",
        category: ThreatCategory::Xss,
        severity: Severity::High,
        message: "Encoded markup",
        strippable: false,
    },
    RulePattern {
        name: "dom_sink",
        pattern: r"(?i)\b(?:document\s*\.\s*(?:cookie|write|domain)|window\s*\.\s*location|(?:inner|outer)HTML\s*=)",
        category: ThreatCategory::Xss,
        severity: Severity::Medium,
        message: "DOM sink access",
        strippable: false,
    },
    RulePattern {
        name: "dialog_call",
        pattern: r#"(?i)\b(?:alert|confirm|prompt)\s*\(\s*(?:\d+|["'`][^"'`]*["'`]|document\b[^)]*)\s*\)"#,
        category: ThreatCategory::Xss,
        severity: Severity::Low,
        message: "Dialog call",
        strippable: false,
    },
];

/// Command injection patterns
pub static COMMAND_INJECTION_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "chained_command",
        pattern: r"(?i)(?:;|\|\|?|&&?)\s*(?:rm|wget|curl|ncat|netcat|bash|zsh|ksh|python|perl|ruby|php|chmod|chown|killall|whoami|uname|nslookup|telnet|ssh|scp|powershell|pwsh|certutil|bitsadmin|(?:cat|ls|id|sh|nc|dig|kill|ping|node|cmd)\s+[-/~.$])",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Critical,
        message: "Shell operator followed by a command",
        strippable: false,
    },
    RulePattern {
        name: "command_substitution",
        pattern: r"\$\(\s*[A-Za-z/]",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Critical,
        message: "Command substitution",
        strippable: false,
    },
    RulePattern {
        name: "variable_expansion",
        pattern: r"\$\{[^{}][^}]*\}",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Medium,
        message: "Shell variable expansion",
        strippable: false,
    },
    RulePattern {
        name: "backtick_command",
        pattern: r"(?i)`[^`]*\b(?:rm|cat|ls|wget|curl|nc|bash|sh|whoami|id|uname|python[23]?|perl|powershell)\b[^`]*`",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Critical,
        message: "Backtick command execution",
        strippable: false,
    },
    RulePattern {
        name: "powershell_cmdlet",
        pattern: r"(?i)\b(?:Invoke-Expression|Invoke-WebRequest|Invoke-Command|Start-Process|Set-ExecutionPolicy|DownloadString|DownloadFile|IEX\s*[(\x22'$])|New-Object\s+(?:System\.)?Net\.WebClient",
        category: ThreatCategory::CommandInjection,
        severity: Severity::High,
        message: "PowerShell execution idiom",
        strippable: false,
    },
    RulePattern {
        name: "netcat_invocation",
        pattern: r"(?i)\b(?:nc|ncat|netcat)\s+(?:-[a-z]*[elvp]|(?:\d{1,3}\.){3}\d{1,3}\s+\d)",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Critical,
        message: "Netcat invocation",
        strippable: false,
    },
    RulePattern {
        name: "telnet_invocation",
        pattern: r"(?i)\btelnet\s+\S+\s+\d",
        category: ThreatCategory::CommandInjection,
        severity: Severity::High,
        message: "Telnet invocation",
        strippable: false,
    },
];

/// SQL injection patterns
pub static SQL_INJECTION_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "quote_tautology",
        pattern: r#"(?i)['"]\s*(?:or|and)\s+['"]?\w+['"]?\s*(?:=|like)\s*['"]?\w+"#,
        category: ThreatCategory::SqlInjection,
        severity: Severity::Critical,
        message: "Quote-breaking boolean tautology",
        strippable: false,
    },
    RulePattern {
        name: "numeric_tautology",
        pattern: r"(?i)\b(?:or|and)\s+\d+\s*=\s*\d",
        category: ThreatCategory::SqlInjection,
        severity: Severity::High,
        message: "Numeric boolean tautology",
        strippable: false,
    },
    RulePattern {
        name: "union_select",
        pattern: r"(?i)\bunion\s+(?:all\s+)?select",
        category: ThreatCategory::SqlInjection,
        severity: Severity::Critical,
        message: "UNION SELECT",
        strippable: false,
    },
    RulePattern {
        name: "stacked_query",
        pattern: r"(?i);\s*(?:(?:drop|truncate|alter)\s+(?:table|database)|delete\s+from|insert\s+into|update\s+\w+\s+set|exec(?:ute)?\s+\w)",
        category: ThreatCategory::SqlInjection,
        severity: Severity::Critical,
        message: "Stacked destructive query",
        strippable: false,
    },
    RulePattern {
        name: "time_based_blind",
        pattern: r"(?i)\b(?:sleep|pg_sleep|benchmark)\s*\(\s*\d|\bwaitfor\s+delay",
        category: ThreatCategory::SqlInjection,
        severity: Severity::High,
        message: "Time-based blind injection",
        strippable: false,
    },
    RulePattern {
        name: "comment_truncation",
        pattern: r#"(?i)['"]\s*(?:--|#|/\*)"#,
        category: ThreatCategory::SqlInjection,
        severity: Severity::High,
        message: "Comment-based query truncation",
        strippable: false,
    },
    RulePattern {
        name: "schema_enumeration",
        pattern: r"(?i)\binformation_schema|\bsys(?:objects|columns)",
        category: ThreatCategory::SqlInjection,
        severity: Severity::Medium,
        message: "Schema enumeration",
        strippable: false,
    },
];

/// Path traversal patterns
pub static PATH_TRAVERSAL_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "dot_dot_slash",
        pattern: r"\.\.[/\\]",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Directory traversal sequence",
        strippable: false,
    },
    RulePattern {
        name: "encoded_dot_dot",
        pattern: r"(?i)(?:%2e%2e|\.%2e|%2e\.)(?:[/\\]|%2f|%5c)|\.\.(?:%2f|%5c)",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Percent-encoded traversal sequence",
        strippable: false,
    },
    RulePattern {
        name: "double_encoded",
        pattern: r"(?i)%25(?:2e|2f|5c)",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Double-encoded traversal sequence",
        strippable: false,
    },
    RulePattern {
        name: "unicode_encoded",
        pattern: r"(?i)%u(?:002e|002f|005c|2215|2216)|%c0%(?:ae|af)|%c1%9c|\\u002e\\u002e",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Unicode-encoded traversal sequence",
        strippable: false,
    },
    RulePattern {
        name: "absolute_unix_path",
        pattern: r#"(?:^|[\s"'=(])/(?:etc|proc|sys|root|boot|dev|var|usr|bin|tmp)/"#,
        category: ThreatCategory::PathTraversal,
        severity: Severity::Medium,
        message: "Absolute filesystem path",
        strippable: false,
    },
    RulePattern {
        name: "absolute_windows_path",
        pattern: r"(?i)\b[a-z]:[\\/](?:windows|winnt|users|program files|inetpub|boot\.ini)",
        category: ThreatCategory::PathTraversal,
        severity: Severity::Medium,
        message: "Absolute Windows path",
        strippable: false,
    },
    RulePattern {
        name: "file_uri",
        pattern: r"(?i)\bfile://",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "file:// URI",
        strippable: false,
    },
    RulePattern {
        name: "null_byte_suffix",
        pattern: r"(?i)%00|\\x00|\\u0000",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Encoded null byte truncation",
        strippable: false,
    },
    RulePattern {
        name: "sensitive_file",
        pattern: r"(?i)\betc/(?:passwd|shadow|hosts)|\b(?:win|boot)\.ini|\.htaccess|\.env|\bid_rsa|\.ssh/",
        category: ThreatCategory::PathTraversal,
        severity: Severity::High,
        message: "Reference to a sensitive file",
        strippable: false,
    },
];

/// Sensitive data patterns (values)
pub static SENSITIVE_DATA_PATTERNS: &[RulePattern] = &[
    RulePattern {
        name: "private_key_block",
        pattern: r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |ENCRYPTED |PGP )?PRIVATE KEY(?: BLOCK)?-----",
        category: ThreatCategory::SensitiveData,
        severity: Severity::Critical,
        message: "PEM private key",
        strippable: false,
    },
    RulePattern {
        name: "aws_access_key_id",
        pattern: r"\b(?:AKIA|ASIA)[0-9A-Z]{16}",
        category: ThreatCategory::SensitiveData,
        severity: Severity::Critical,
        message: "AWS access key id",
        strippable: false,
    },
    RulePattern {
        name: "provider_api_key",
        pattern: r"\bsk-(?:ant-|proj-)?[A-Za-z0-9_-]{20,}|\bgh[pousr]_[A-Za-z0-9]{36}|\bxox[abprs]-[A-Za-z0-9-]{10,}",
        category: ThreatCategory::SensitiveData,
        severity: Severity::Critical,
        message: "Provider API key",
        strippable: false,
    },
    RulePattern {
        name: "connection_string",
        pattern: r"(?i)\b(?:mongodb(?:\+srv)?|postgres(?:ql)?|mysql|mariadb|redis|amqp|mssql)://[^\s:/@]+:[^\s@]+@",
        category: ThreatCategory::SensitiveData,
        severity: Severity::Critical,
        message: "Connection string with embedded credentials",
        strippable: false,
    },
    RulePattern {
        name: "bearer_token",
        pattern: r"(?i)\bbearer\s+[a-z0-9._~+/-]{20,}=*",
        category: ThreatCategory::SensitiveData,
        severity: Severity::High,
        message: "Bearer token",
        strippable: false,
    },
    RulePattern {
        name: "jwt",
        pattern: r"\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}",
        category: ThreatCategory::SensitiveData,
        severity: Severity::High,
        message: "JSON web token",
        strippable: false,
    },
    RulePattern {
        name: "credit_card_number",
        pattern: r"\b(?:\d{4}[ -]?){3}\d{4}",
        category: ThreatCategory::SensitiveData,
        severity: Severity::High,
        message: "Credit-card-like digit groups",
        strippable: false,
    },
    RulePattern {
        name: "ssn",
        pattern: r"\b\d{3}-\d{2}-\d{4}",
        category: ThreatCategory::SensitiveData,
        severity: Severity::High,
        message: "SSN-like digit groups",
        strippable: false,
    },
];

/// Credential key names for the key/value rule
pub static SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "api_key",
    "secret",
    "secret_key",
    "client_secret",
    "token",
    "access_token",
    "auth_token",
    "refresh_token",
    "aws_access_key_id",
    "aws_secret_access_key",
    "private_key",
    "connection_string",
    "database_url",
];

/// Literal rules
pub static LITERAL_RULES: &[RuleLiteral] = &[
    RuleLiteral {
        name: "child_process",
        literal: "child_process",
        category: ThreatCategory::CodeInjection,
        severity: Severity::Critical,
        message: "Reference to child_process module",
    },
    RuleLiteral {
        name: "dev_tcp",
        literal: "/dev/tcp/",
        category: ThreatCategory::CommandInjection,
        severity: Severity::Critical,
        message: "Bash network redirection",
    },
    RuleLiteral {
        name: "xp_cmdshell",
        literal: "xp_cmdshell",
        category: ThreatCategory::SqlInjection,
        severity: Severity::Critical,
        message: "SQL Server shell procedure",
    },
];

/// Structural rules
pub static STRUCTURAL_RULES: &[RuleStructural] = &[
    RuleStructural {
        name: "min_length",
        check: StructuralCheck::MinLength,
        severity: Severity::Medium,
        message: "Template is shorter than minimum length",
    },
    RuleStructural {
        name: "max_length",
        check: StructuralCheck::MaxLength,
        severity: Severity::High,
        message: "Template exceeds maximum length",
    },
    RuleStructural {
        name: "nesting_depth",
        check: StructuralCheck::NestingDepth,
        severity: Severity::High,
        message: "Template placeholder nesting reaches maximum depth",
    },
    RuleStructural {
        name: "variable_count",
        check: StructuralCheck::VariableCount,
        severity: Severity::Low,
        message: "Template uses an unusually high number of variables",
    },
    RuleStructural {
        name: "null_byte",
        check: StructuralCheck::NullByte,
        severity: Severity::Critical,
        message: "Template contains null bytes",
    },
    RuleStructural {
        name: "invalid_encoding",
        check: StructuralCheck::InvalidEncoding,
        severity: Severity::Critical,
        message: "Template is not valid UTF-8",
    },
];
