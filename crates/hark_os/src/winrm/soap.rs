//! WS-Management SOAP envelopes for the Windows remote shell, and the bits of
//! the replies we need to read back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const NS_DECLS: &str = concat!(
    r#"xmlns:env="http://www.w3.org/2003/05/soap-envelope" "#,
    r#"xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" "#,
    r#"xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd" "#,
    r#"xmlns:p="http://schemas.microsoft.com/wbem/wsman/1/wsman.xsd" "#,
    r#"xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell""#,
);

const RESOURCE_URI_CMD: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";
const ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";
const SIGNAL_TERMINATE: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";
const STATE_DONE_SUFFIX: &str = "CommandState/Done";

/// WS-Man fault code for "no output yet, poll again".
const OPERATION_TIMEOUT_CODE: &str = "2150858793";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Command,
    Receive,
    Signal,
    Delete,
}

impl Action {
    pub fn uri(self) -> &'static str {
        match self {
            Self::Create => "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create",
            Self::Command => "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command",
            Self::Receive => "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive",
            Self::Signal => "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal",
            Self::Delete => "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete",
        }
    }
}

/// Builds request envelopes for one endpoint.
#[derive(Debug, Clone)]
pub struct Envelope {
    endpoint: String,
    operation_timeout: Duration,
}

impl Envelope {
    pub fn new(endpoint: impl Into<String>, operation_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            operation_timeout,
        }
    }

    fn build(
        &self,
        action: Action,
        shell_id: Option<&str>,
        options: &[(&str, &str)],
        body: &str,
    ) -> String {
        let mut header = String::new();
        header.push_str(&format!("<a:To>{}</a:To>", xml_escape(&self.endpoint)));
        header.push_str(&format!(
            r#"<a:ReplyTo><a:Address mustUnderstand="true">{}</a:Address></a:ReplyTo>"#,
            ANONYMOUS
        ));
        header.push_str(r#"<w:MaxEnvelopeSize mustUnderstand="true">153600</w:MaxEnvelopeSize>"#);
        header.push_str(&format!("<a:MessageID>uuid:{}</a:MessageID>", uuid::Uuid::new_v4()));
        header.push_str(r#"<w:Locale mustUnderstand="false" xml:lang="en-US"/>"#);
        header.push_str(r#"<p:DataLocale mustUnderstand="false" xml:lang="en-US"/>"#);
        header.push_str(&format!(
            "<w:OperationTimeout>PT{}S</w:OperationTimeout>",
            self.operation_timeout.as_secs().max(1)
        ));
        header.push_str(&format!(
            r#"<w:ResourceURI mustUnderstand="true">{}</w:ResourceURI>"#,
            RESOURCE_URI_CMD
        ));
        header.push_str(&format!(
            r#"<a:Action mustUnderstand="true">{}</a:Action>"#,
            action.uri()
        ));
        if let Some(id) = shell_id {
            header.push_str(&format!(
                r#"<w:SelectorSet><w:Selector Name="ShellId">{}</w:Selector></w:SelectorSet>"#,
                xml_escape(id)
            ));
        }
        if !options.is_empty() {
            header.push_str("<w:OptionSet>");
            for (name, value) in options {
                header.push_str(&format!(r#"<w:Option Name="{}">{}</w:Option>"#, name, value));
            }
            header.push_str("</w:OptionSet>");
        }

        format!(
            "<env:Envelope {}><env:Header>{}</env:Header><env:Body>{}</env:Body></env:Envelope>",
            NS_DECLS, header, body
        )
    }

    pub fn create_shell(&self) -> String {
        self.build(
            Action::Create,
            None,
            &[("WINRS_NOPROFILE", "FALSE"), ("WINRS_CODEPAGE", "65001")],
            "<rsp:Shell><rsp:InputStreams>stdin</rsp:InputStreams>\
             <rsp:OutputStreams>stdout stderr</rsp:OutputStreams></rsp:Shell>",
        )
    }

    pub fn command(&self, shell_id: &str, command: &str, arguments: &[&str]) -> String {
        let mut body = format!(
            "<rsp:CommandLine><rsp:Command>{}</rsp:Command>",
            xml_escape(command)
        );
        for arg in arguments {
            body.push_str(&format!("<rsp:Arguments>{}</rsp:Arguments>", xml_escape(arg)));
        }
        body.push_str("</rsp:CommandLine>");
        self.build(
            Action::Command,
            Some(shell_id),
            &[("WINRS_CONSOLEMODE_STDIN", "TRUE"), ("WINRS_SKIP_CMD_SHELL", "FALSE")],
            &body,
        )
    }

    pub fn receive(&self, shell_id: &str, command_id: &str) -> String {
        let body = format!(
            r#"<rsp:Receive><rsp:DesiredStream CommandId="{}">stdout stderr</rsp:DesiredStream></rsp:Receive>"#,
            xml_escape(command_id)
        );
        self.build(Action::Receive, Some(shell_id), &[], &body)
    }

    pub fn signal_terminate(&self, shell_id: &str, command_id: &str) -> String {
        let body = format!(
            r#"<rsp:Signal CommandId="{}"><rsp:Code>{}</rsp:Code></rsp:Signal>"#,
            xml_escape(command_id),
            SIGNAL_TERMINATE
        );
        self.build(Action::Signal, Some(shell_id), &[], &body)
    }

    pub fn delete_shell(&self, shell_id: &str) -> String {
        self.build(Action::Delete, Some(shell_id), &[], "")
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// One Receive reply: decoded stream bytes and the command state.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReceiveChunk {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub done: bool,
    pub exit_code: Option<i32>,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static WS-Man regex is valid"))
}

pub fn parse_shell_id(xml: &str) -> Option<String> {
    static SELECTOR: OnceLock<Regex> = OnceLock::new();
    static ELEMENT: OnceLock<Regex> = OnceLock::new();
    let selector = regex(&SELECTOR, r#"<(?:\w+:)?Selector Name="ShellId">\s*([^<\s]+)\s*<"#);
    let element = regex(&ELEMENT, r"<(?:\w+:)?ShellId>\s*([^<\s]+)\s*<");
    selector
        .captures(xml)
        .or_else(|| element.captures(xml))
        .map(|c| c[1].to_string())
}

pub fn parse_command_id(xml: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<(?:\w+:)?CommandId>\s*([^<\s]+)\s*<")
        .captures(xml)
        .map(|c| c[1].to_string())
}

pub fn parse_receive(xml: &str) -> ReceiveChunk {
    static STREAM: OnceLock<Regex> = OnceLock::new();
    static STATE: OnceLock<Regex> = OnceLock::new();
    static EXIT: OnceLock<Regex> = OnceLock::new();
    let stream = regex(
        &STREAM,
        r#"<(?:\w+:)?Stream\b[^>]*\bName="(\w+)"[^>]*?(?:/>|>([^<]*)</(?:\w+:)?Stream>)"#,
    );
    let state = regex(&STATE, r#"<(?:\w+:)?CommandState\b[^>]*\bState="([^"]+)""#);
    let exit = regex(&EXIT, r"<(?:\w+:)?ExitCode>\s*(-?\d+)\s*<");

    let mut chunk = ReceiveChunk::default();
    for caps in stream.captures_iter(xml) {
        let Some(content) = caps.get(2).map(|m| m.as_str().trim()) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        let decoded = match STANDARD.decode(content) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("undecodable WinRM stream chunk: {}", e);
                continue;
            }
        };
        match &caps[1] {
            "stdout" => chunk.stdout.extend_from_slice(&decoded),
            "stderr" => chunk.stderr.extend_from_slice(&decoded),
            other => tracing::debug!("ignoring WinRM stream {}", other),
        }
    }

    chunk.done = state
        .captures(xml)
        .map(|c| c[1].ends_with(STATE_DONE_SUFFIX))
        .unwrap_or(false);
    // Exit codes arrive as unsigned 32-bit values (e.g. 4294967295 for -1).
    chunk.exit_code = exit
        .captures(xml)
        .and_then(|c| c[1].parse::<i64>().ok())
        .map(|n| n as i32);
    chunk
}

/// True when a fault only means the server had nothing to say yet.
pub fn is_operation_timeout(xml: &str) -> bool {
    xml.contains(OPERATION_TIMEOUT_CODE)
}

/// Human-readable text of a SOAP fault.
pub fn fault_message(xml: &str) -> Option<String> {
    static MESSAGE: OnceLock<Regex> = OnceLock::new();
    static TEXT: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let message = regex(&MESSAGE, r"(?s)<(?:\w+:)?Message>(.*?)</(?:\w+:)?Message>");
    let text = regex(&TEXT, r"(?s)<(?:\w+:)?Text\b[^>]*>(.*?)</(?:\w+:)?Text>");
    let tags = regex(&TAGS, r"<[^>]+>");

    let raw = message
        .captures(xml)
        .or_else(|| text.captures(xml))
        .map(|c| c[1].to_string())?;
    let flattened = tags.replace_all(&raw, " ");
    let cleaned = xml_unescape(flattened.split_whitespace().collect::<Vec<_>>().join(" ").as_str());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

// ============================================================================
// PowerShell helpers
// ============================================================================

/// Argument for `powershell -encodedcommand`: base64 of the UTF-16LE script.
pub fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    STANDARD.encode(utf16)
}

/// Flatten PowerShell's CLIXML error serialization into plain text. Anything
/// that is not CLIXML is returned unchanged.
pub fn clean_clixml(stderr: &str) -> String {
    static ERROR_LINE: OnceLock<Regex> = OnceLock::new();
    let Some(rest) = stderr.trim_start().strip_prefix("#< CLIXML") else {
        return stderr.to_string();
    };
    let re = regex(&ERROR_LINE, r#"(?s)<S S="Error">(.*?)</S>"#);
    let text: String = re
        .captures_iter(rest)
        .map(|c| c[1].replace("_x000D__x000A_", "\n"))
        .collect();
    xml_unescape(text.trim_end())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
