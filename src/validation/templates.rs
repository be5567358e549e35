//! Localized violation messages keyed by rule identifier.
//!
//! Templates use `{field}`, `{rule_value}` and `{field_value}` placeholders.

use std::collections::HashMap;

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateArgs<'a> {
    pub field: &'a str,
    pub rule_value: Option<&'a str>,
    pub field_value: Option<&'a str>,
}

/// Rule id to message template table.
#[derive(Debug, Clone, Default)]
pub struct MessageTemplates {
    templates: HashMap<String, String>,
}

impl MessageTemplates {
    /// Empty table: every violation keeps its own message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Russian messages for the standard rule set.
    pub fn ru() -> Self {
        Self {
            templates: RU
                .iter()
                .map(|(id, tmpl)| (id.to_string(), tmpl.to_string()))
                .collect(),
        }
    }

    /// Add or replace one template.
    pub fn with(mut self, rule_id: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(rule_id.into(), template.into());
        self
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if the table has no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render the template for `rule_id`, if one exists.
    pub fn render(&self, rule_id: &str, args: TemplateArgs<'_>) -> Option<String> {
        let template = self.templates.get(rule_id)?;
        Some(
            template
                .replace("{field}", args.field)
                .replace("{rule_value}", args.rule_value.unwrap_or_default())
                .replace("{field_value}", args.field_value.unwrap_or_default()),
        )
    }
}

const RU: &[(&str, &str)] = &[
    ("float.const", "значение должно быть равно {rule_value}"),
    ("float.in", "значение должно входить в список {rule_value}"),
    ("float.not_in", "значение не должно входить в список {rule_value}"),
    ("float.finite", "значение {field_value} должно быть конечным числом"),
    ("double.const", "значение должно быть равно {rule_value}"),
    ("double.in", "значение должно входить в список {rule_value}"),
    ("double.not_in", "значение не должно входить в список {rule_value}"),
    ("double.finite", "значение {field_value} должно быть конечным числом"),
    ("int32.const", "значение должно быть равно {rule_value}"),
    ("int32.in", "значение должно входить в список {rule_value}"),
    ("int32.not_in", "значение не должно входить в список {rule_value}"),
    ("int64.const", "значение должно быть равно {rule_value}"),
    ("int64.in", "значение должно входить в список {rule_value}"),
    ("int64.not_in", "значение не должно входить в список {rule_value}"),
    ("uint32.const", "значение должно быть равно {rule_value}"),
    ("uint32.in", "значение должно входить в список {rule_value}"),
    ("uint32.not_in", "значение не должно входить в список {rule_value}"),
    ("uint64.const", "значение должно быть равно {rule_value}"),
    ("uint64.in", "значение должно входить в список {rule_value}"),
    ("uint64.not_in", "значение не должно входить в список {rule_value}"),
    ("sint32.const", "значение должно быть равно {rule_value}"),
    ("sint32.in", "значение должно входить в список {rule_value}"),
    ("sint32.not_in", "значение не должно входить в список {rule_value}"),
    ("sint64.const", "значение должно быть равно {rule_value}"),
    ("sint64.in", "значение должно входить в список {rule_value}"),
    ("sint64.not_in", "значение не должно входить в список {rule_value}"),
    ("fixed32.const", "значение должно быть равно {rule_value}"),
    ("fixed32.in", "значение должно входить в список {rule_value}"),
    ("fixed32.not_in", "значение не должно входить в список {rule_value}"),
    ("fixed64.const", "значение должно быть равно {rule_value}"),
    ("fixed64.in", "значение должно входить в список {rule_value}"),
    ("fixed64.not_in", "значение не должно входить в список {rule_value}"),
    ("sfixed32.const", "значение должно быть равно {rule_value}"),
    ("sfixed32.in", "значение должно входить в список {rule_value}"),
    ("sfixed32.not_in", "значение не должно входить в список {rule_value}"),
    ("sfixed64.const", "значение должно быть равно {rule_value}"),
    ("sfixed64.in", "значение должно входить в список {rule_value}"),
    ("sfixed64.not_in", "значение не должно входить в список {rule_value}"),
    ("bool.const", "значение должно быть равно {rule_value}"),
    ("string.const", "значение должно быть равно «{rule_value}»"),
    ("string.len", "длина значения должна быть {rule_value} символов"),
    ("string.min_len", "длина значения должна быть не меньше {rule_value} символов"),
    ("string.max_len", "длина значения должна быть не больше {rule_value} символов"),
    ("string.len_bytes", "длина значения должна быть {rule_value} байт"),
    ("string.min_bytes", "длина значения должна быть не меньше {rule_value} байт"),
    ("string.max_bytes", "длина значения должна быть не больше {rule_value} байт"),
    ("string.pattern", "значение не соответствует шаблону регулярного выражения «{rule_value}»"),
    ("string.prefix", "значение не имеет префикса «{rule_value}»"),
    ("string.suffix", "значение не имеет суффикса «{rule_value}»"),
    ("string.contains", "значение не содержит подстроку «{rule_value}»"),
    ("string.not_contains", "значение содержит запрещённую подстроку «{rule_value}»"),
    ("string.in", "значение должно входить в список {rule_value}"),
    ("string.not_in", "значение не должно входить в список {rule_value}"),
    ("string.email", "значение должно быть корректным адресом электронной почты"),
    ("string.email_empty", "пустое значение не является допустимым адресом электронной почты"),
    ("string.hostname", "значение должно быть корректным именем хоста"),
    ("string.hostname_empty", "пустое значение не является допустимым именем хоста"),
    ("string.ip", "значение должно быть корректным IP-адресом"),
    ("string.ip_empty", "пустое значение не является допустимым IP-адресом"),
    ("string.ipv4", "значение должно быть корректным IPv4-адресом"),
    ("string.ipv4_empty", "пустое значение не является допустимым IPv4-адресом"),
    ("string.ipv6", "значение должно быть корректным IPv6-адресом"),
    ("string.ipv6_empty", "пустое значение не является допустимым IPv6-адресом"),
    ("string.uri", "значение должно быть корректным URI"),
    ("string.uri_empty", "пустое значение не является допустимым URI"),
    ("string.uri_ref", "значение должно быть корректной ссылкой URI"),
    ("string.address", "значение должно быть корректным именем хоста или IP-адресом"),
    ("string.address_empty", "пустое значение не является допустимым именем хоста или IP-адресом"),
    ("string.uuid", "значение должно быть корректным UUID"),
    ("string.uuid_empty", "пустое значение не является допустимым UUID"),
    ("string.tuuid", "значение должно быть корректным UUID без дефисов"),
    ("string.tuuid_empty", "пустое значение не является допустимым UUID без дефисов"),
    ("string.ip_with_prefixlen", "значение должно быть корректным IP с длиной префикса"),
    (
        "string.ip_with_prefixlen_empty",
        "пустое значение не является допустимым IP с длиной префикса",
    ),
    ("string.ipv4_with_prefixlen", "значение должно быть корректным IPv4 с длиной префикса"),
    (
        "string.ipv4_with_prefixlen_empty",
        "пустое значение не является допустимым IPv4 с длиной префикса",
    ),
    ("string.ipv6_with_prefixlen", "значение должно быть корректным IPv6 с длиной префикса"),
    (
        "string.ipv6_with_prefixlen_empty",
        "пустое значение не является допустимым IPv6 с длиной префикса",
    ),
    ("string.ip_prefix", "значение должно быть корректным IP-префиксом"),
    ("string.ip_prefix_empty", "пустое значение не является допустимым IP-префиксом"),
    ("string.ipv4_prefix", "значение должно быть корректным IPv4-префиксом"),
    ("string.ipv4_prefix_empty", "пустое значение не является допустимым IPv4-префиксом"),
    ("string.ipv6_prefix", "значение должно быть корректным IPv6-префиксом"),
    ("string.ipv6_prefix_empty", "пустое значение не является допустимым IPv6-префиксом"),
    ("string.host_and_port", "значение должно быть корректной парой «хост:порт»"),
    ("string.host_and_port_empty", "пустое значение не является допустимой парой «хост:порт»"),
    (
        "string.well_known_regex.header_name",
        "значение должно быть корректным именем HTTP-заголовка",
    ),
    (
        "string.well_known_regex.header_name_empty",
        "пустое значение не является допустимым именем HTTP-заголовка",
    ),
    (
        "string.well_known_regex.header_value",
        "значение должно быть корректным значением HTTP-заголовка",
    ),
    ("bytes.const", "значение должно быть равно {rule_value}"),
    ("bytes.len", "длина значения должна быть {rule_value} байт"),
    ("bytes.min_len", "длина значения должна быть не меньше {rule_value} байт"),
    ("bytes.max_len", "длина значения должна быть не больше {rule_value} байт"),
    ("bytes.pattern", "значение должно соответствовать шаблону «{rule_value}»"),
    ("bytes.prefix", "значение не имеет префикса {rule_value}"),
    ("bytes.suffix", "значение не имеет суффикса {rule_value}"),
    ("bytes.contains", "значение не содержит {rule_value}"),
    ("bytes.in", "значение должно входить в список {rule_value}"),
    ("bytes.not_in", "значение не должно входить в список {rule_value}"),
    ("bytes.ip", "значение должно быть корректным IP-адресом"),
    ("bytes.ip_empty", "пустое значение не является допустимым IP-адресом"),
    ("bytes.ipv4", "значение должно быть корректным IPv4-адресом"),
    ("bytes.ipv4_empty", "пустое значение не является допустимым IPv4-адресом"),
    ("bytes.ipv6", "значение должно быть корректным IPv6-адресом"),
    ("bytes.ipv6_empty", "пустое значение не является допустимым IPv6-адресом"),
    ("enum.const", "значение должно быть равно {rule_value}"),
    ("enum.in", "значение должно входить в список {rule_value}"),
    ("enum.not_in", "значение не должно входить в список {rule_value}"),
    ("repeated.min_items", "в списке должно быть не менее {rule_value} элементов"),
    ("repeated.max_items", "в списке должно быть не более {rule_value} элементов"),
    ("repeated.unique", "значения в списке должны быть уникальными"),
    ("map.min_pairs", "в карте должно быть не менее {rule_value} пар ключ-значение"),
    ("map.max_pairs", "в карте должно быть не более {rule_value} пар ключ-значение"),
    ("duration.const", "значение должно быть равно {rule_value}"),
    ("duration.in", "значение должно входить в список {rule_value}"),
    ("duration.not_in", "значение не должно входить в список {rule_value}"),
    ("timestamp.const", "значение должно быть равно {rule_value}"),
    ("timestamp.lt_now", "значение должно быть меньше текущего времени"),
    ("timestamp.gt_now", "значение должно быть больше текущего времени"),
    ("timestamp.within", "значение должно находиться в пределах {rule_value} от текущего времени"),
];
