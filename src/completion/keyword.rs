use super::pattern::MatchPattern;

#[rustfmt::skip]
const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte",
    "case", "catch", "char", "class", "const", "continue",
    "default", "do", "double", "else", "enum", "extends",
    "false", "final", "finally", "float", "for", "goto", "if",
    "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "null", "package", "private", "protected",
    "public", "return", "short", "static", "strictfp", "super",
    "switch", "synchronized", "this", "throw", "throws", "transient",
    "true", "try", "var", "void", "volatile", "while",
    // Java 17+
    "record", "sealed", "permits", "yield",
];

/// Keywords matching the typed token. Nothing is proposed before a first
/// character is typed.
pub fn matching_keywords(pattern: &MatchPattern) -> impl Iterator<Item = &'static str> + '_ {
    JAVA_KEYWORDS
        .iter()
        .copied()
        .filter(move |kw| !pattern.token().is_empty() && pattern.matches(kw))
}
