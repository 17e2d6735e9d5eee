//! Interactive command dispatch.
//!
//! A [`Session`] owns everything the console mutates: the active vhost and the
//! last listing. Verbs always win over numeric shortcuts; anything that is
//! neither is reported and the session carries on.

use std::io::{self, Write};

use crate::abort::AbortFlag;
use crate::client::{FetchError, ManagementClient, escape_segment};
use crate::editor::LineSource;
use crate::listing::{EntityKind, Entry, ListContext, collection_request};
use crate::structure::{StructureNode, render_element};

/// Console verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Overview,
    Vhost,
    Nodes,
    Connections,
    Channels,
    Exchanges,
    Queues,
    Vhosts,
    Users,
    Trace,
    Graph,
    Exit,
    Quit,
}

impl Verb {
    pub(crate) const ALL: [Self; 13] = [
        Self::Overview,
        Self::Vhost,
        Self::Nodes,
        Self::Connections,
        Self::Channels,
        Self::Exchanges,
        Self::Queues,
        Self::Vhosts,
        Self::Users,
        Self::Trace,
        Self::Graph,
        Self::Exit,
        Self::Quit,
    ];

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Vhost => "vhost",
            Self::Nodes => "nodes",
            Self::Connections => "connections",
            Self::Channels => "channels",
            Self::Exchanges => "exchanges",
            Self::Queues => "queues",
            Self::Vhosts => "vhosts",
            Self::Users => "users",
            Self::Trace => "trace",
            Self::Graph => "graph",
            Self::Exit => "exit",
            Self::Quit => "quit",
        }
    }

    pub(crate) fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.name() == token)
    }
}

/// Verb names starting with `prefix`, sorted.
pub(crate) fn complete(prefix: &str) -> Vec<&'static str> {
    let mut matches: Vec<_> = Verb::ALL
        .into_iter()
        .map(Verb::name)
        .filter(|name| name.starts_with(prefix))
        .collect();
    matches.sort_unstable();
    matches
}

/// Whether the console should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// State of one interactive console.
pub(crate) struct Session<W: Write> {
    client: ManagementClient,
    abort: AbortFlag,
    vhost: String,
    list: Option<ListContext>,
    out: W,
}

impl<W: Write> Session<W> {
    pub(crate) fn new(
        client: ManagementClient,
        abort: AbortFlag,
        vhost: impl Into<String>,
        out: W,
    ) -> Self {
        Self {
            client,
            abort,
            vhost: vhost.into(),
            list: None,
            out,
        }
    }

    fn prompt(&self) -> String {
        format!("warren {} > ", self.vhost)
    }

    /// Read and execute lines until `exit`/`quit` or end of input.
    pub(crate) async fn run<L: LineSource>(&mut self, mut input: L) -> io::Result<()> {
        loop {
            let prompt = self.prompt();
            let Some(line) = input.read_line(&prompt, &mut self.out).await? else {
                writeln!(self.out)?;
                self.out.flush()?;
                return Ok(());
            };

            let line = line.trim();
            if !line.is_empty() {
                input.remember(line);
            }
            let flow = self.execute(line).await?;
            self.out.flush()?;
            if flow == Flow::Exit {
                tracing::debug!("console closed by user");
                return Ok(());
            }
        }
    }

    /// Execute one line of input.
    ///
    /// Only failures writing to the terminal are returned; every command-level
    /// failure is reported to the user instead.
    pub(crate) async fn execute(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = tokens.collect();

        if let Some(verb) = Verb::parse(head) {
            tracing::debug!(verb = verb.name(), "dispatching verb");
            return self.run_verb(verb, &args).await;
        }

        if let Ok(index) = line.parse::<i64>() {
            self.show_index(index).await?;
        } else {
            self.reject(head)?;
        }
        Ok(Flow::Continue)
    }

    async fn run_verb(&mut self, verb: Verb, args: &[&str]) -> io::Result<Flow> {
        match verb {
            Verb::Overview => self.show_element("overview", "overview").await?,
            Verb::Vhost => self.change_vhost(args).await?,
            Verb::Nodes => self.list(EntityKind::Node).await?,
            Verb::Connections => self.list(EntityKind::Connection).await?,
            Verb::Channels => self.list(EntityKind::Channel).await?,
            Verb::Exchanges => self.list(EntityKind::Exchange).await?,
            Verb::Queues => self.list(EntityKind::Queue).await?,
            Verb::Vhosts => self.list(EntityKind::Vhost).await?,
            Verb::Users => self.list(EntityKind::User).await?,
            Verb::Trace | Verb::Graph => writeln!(self.out, "Under construction.")?,
            Verb::Exit | Verb::Quit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    async fn list(&mut self, kind: EntityKind) -> io::Result<()> {
        let vhost = kind.is_vhost_scoped().then_some(self.vhost.as_str());
        let (path, query) = collection_request(kind, vhost);
        let result = self
            .client
            .fetch_json::<Vec<Entry>>(&path, query, &self.abort, &mut self.out)
            .await;

        match result {
            Ok(entries) => {
                let list = ListContext::new(kind, entries);
                list.render(&mut self.out)?;
                self.list = Some(list);
                Ok(())
            }
            Err(err) => self.report(err),
        }
    }

    async fn show_index(&mut self, index: i64) -> io::Result<()> {
        let Some(list) = &self.list else {
            return writeln!(self.out, "No list.");
        };
        let Some(entry) = list.resolve(index) else {
            return writeln!(self.out, "Index out of bounds.");
        };
        tracing::debug!(kind = list.kind().name(), index, "resolving list index");

        let path = list.detail_path(entry);
        let title = list.title(entry);
        self.show_element(&path, &title).await
    }

    async fn show_element(&mut self, path: &str, title: &str) -> io::Result<()> {
        let result = self
            .client
            .fetch_json::<StructureNode>(path, "", &self.abort, &mut self.out)
            .await;

        match result {
            Ok(node) => render_element(title, &node, &mut self.out),
            Err(err) => self.report(err),
        }
    }

    async fn change_vhost(&mut self, args: &[&str]) -> io::Result<()> {
        let [name] = args else {
            return writeln!(self.out, "Usage: vhost <name>");
        };
        let path = format!("vhosts/{}", escape_segment(name));

        match self.client.exists(&path).await {
            Ok(()) => {
                tracing::info!(from = %self.vhost, to = %name, "switched vhost");
                self.vhost = (*name).to_string();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(vhost = %name, error = %err, "vhost lookup failed");
                writeln!(self.out, "No such vhost.")
            }
        }
    }

    fn reject(&mut self, head: &str) -> io::Result<()> {
        writeln!(self.out, "Sorry, unknown command.")?;
        let candidates = complete(head);
        if !candidates.is_empty() {
            writeln!(self.out, "Did you mean: {}?", candidates.join(", "))?;
        }
        Ok(())
    }

    fn report(&mut self, err: FetchError) -> io::Result<()> {
        match err {
            FetchError::Aborted => Ok(()),
            FetchError::Output(err) => Err(err),
            FetchError::Decode(_) => writeln!(self.out, "Malformed response."),
            other => {
                tracing::debug!(error = %other, "command failed");
                writeln!(self.out, "Request failed.")
            }
        }
    }
}
