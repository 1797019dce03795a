//! Reply types returned from a chat turn.

use std::fmt;

use serde::Serialize;

use crate::report::ReportSection;

pub const HELP_TEXT: &str = "\
**How to use LedgerChat:**

1. **Authentication**: Mention your email, password, and tenant to sign in \
(e.g. \"login with user@mail.com password 123 tenant XYZ\"), or just say \"login\" \
and answer the prompts.
2. **Reports**: Ask for \"balance sheet\" or \"profit and loss\" to see live data. \
Add \"last 6 months\" for an explicit window.
3. **Ledgers**: \"ledger for Cash\" fetches an account ledger.
4. **Data Entry**: Mention sales or purchases (e.g. \"record a sale of 500\").
5. **Lookups**: \"show customers\", \"show items\", \"show vendors\", \
or \"find customer Acme\".
6. **Context**: Use \"switch company\" (or \"switch pin 1234\") to change your tenant.
7. Type \"cancel\" to leave the sign-in dialogue.";

pub const NOT_SURE: &str = "I'm not sure how to handle that request yet. \
I can help with bookkeeping, reports, and tenant management.";

/// A generated report with its live summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub title: String,
    pub summary: String,
    pub document_link: String,
    pub sections: Vec<ReportSection>,
}

impl fmt::Display for ReportCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        writeln!(f, "{}", self.summary)?;
        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "{}", section.category)?;
            for line in &section.lines {
                match line.amount {
                    Some(amount) => writeln!(f, "  {:<36} {:>14.2}", line.name, amount)?,
                    None => writeln!(f, "  {}", line.name)?,
                }
            }
            if let Some(total) = section.total {
                writeln!(f, "  {:<36} {:>14.2}", "Total", total)?;
            }
        }
        write!(f, "\nDocument: {}", self.document_link)
    }
}

/// Everything the assistant says in response to one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reply {
    /// Assistant messages in the order they were produced.
    pub messages: Vec<String>,
    pub report: Option<ReportCard>,
}

impl Reply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Append another reply's messages, keeping its report if this one has
    /// none.
    pub fn extend(&mut self, other: Reply) {
        self.messages.extend(other.messages);
        if self.report.is_none() {
            self.report = other.report;
        }
    }

    /// Messages joined into one block of text.
    pub fn text(&self) -> String {
        self.messages.join("\n\n")
    }

    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}
