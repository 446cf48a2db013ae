use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    action::Action,
    config::{Config, NETWORKS},
    domain::address_type::AddressType,
    tui::Frame,
};

use super::Component;

pub struct SettingsComponent {
    action_tx: UnboundedSender<Action>,
    pub current_network: String,
    pub api_url: String,
    pub wallet: String,
    pub address_type: AddressType,
    pub selected_index: usize,
    list_state: ListState,
}

impl SettingsComponent {
    pub fn new(action_tx: UnboundedSender<Action>, config: &Config, address_type: AddressType) -> Self {
        let mut component = Self {
            action_tx,
            current_network: String::new(),
            api_url: String::new(),
            wallet: String::new(),
            address_type,
            selected_index: 0,
            list_state: ListState::default(),
        };
        component.set_config(config);
        component
    }

    pub fn set_config(&mut self, config: &Config) {
        self.current_network = config.network.name.clone();
        self.api_url = config.network.api_url.clone();
        self.wallet = config.wallet.name.clone();
        self.selected_index = NETWORKS
            .iter()
            .position(|name| *name == config.network.name)
            .unwrap_or(0);
        self.list_state.select(Some(self.selected_index));
    }

    fn next(&mut self) {
        self.selected_index = (self.selected_index + 1) % NETWORKS.len();
        self.list_state.select(Some(self.selected_index));
    }

    fn previous(&mut self) {
        self.selected_index = (self.selected_index + NETWORKS.len() - 1) % NETWORKS.len();
        self.list_state.select(Some(self.selected_index));
    }

    fn select_network(&self) -> Result<()> {
        let name = NETWORKS[self.selected_index];
        if name != self.current_network {
            self.action_tx.send(Action::SwitchNetwork(name.to_string()))?;
        }
        Ok(())
    }

    fn network_lines(&self) -> Vec<Line<'static>> {
        let name = NETWORKS[self.selected_index];
        let is_current = name == self.current_network;
        let url = if is_current {
            self.api_url.clone()
        } else {
            Config::from_network(name).network.api_url
        };

        let mut details = vec![
            Line::from(vec![
                Span::styled("Network: ", Style::default().fg(Color::DarkGray)),
                Span::styled(name.to_string(), Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Node API: ", Style::default().fg(Color::DarkGray)),
                Span::styled(url, Style::default().fg(Color::Yellow)),
            ]),
            Line::from(vec![
                Span::styled("Wallet: ", Style::default().fg(Color::DarkGray)),
                Span::styled(self.wallet.clone(), Style::default().fg(Color::White)),
            ]),
            Line::from(""),
        ];

        if name == "mainnet" {
            details.push(Line::from(vec![Span::styled(
                "WARNING: Real funds! Delegations cannot be reversed.",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )]));
        } else {
            details.push(Line::from(vec![Span::styled(
                "Test network. Coins have no real value.",
                Style::default().fg(Color::Gray),
            )]));
        }

        details.push(Line::from(""));
        details.push(Line::from(vec![
            Span::styled("Address type: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{} ({})", self.address_type, self.address_type.encoding()),
                Style::default().fg(Color::Cyan),
            ),
        ]));
        details.push(Line::from(""));
        details.push(Line::from(vec![Span::styled(
            if is_current {
                "[Currently active]  [t] Toggle address type"
            } else {
                "[Enter] Switch to this network  [t] Toggle address type"
            },
            Style::default().fg(Color::DarkGray),
        )]));
        details
    }
}

impl Component for SettingsComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('t') => {
                self.action_tx.send(Action::ToggleAddressType)?;
            }
            KeyCode::Enter => self.select_network()?,
            _ => {}
        }
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::horizontal([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);

        let items: Vec<ListItem> = NETWORKS
            .iter()
            .map(|name| {
                let style = if *name == self.current_network {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::White)
                };
                let marker = if *name == self.current_network { " *" } else { "" };
                ListItem::new(Line::from(vec![Span::styled(
                    format!("{}{}", name, marker),
                    style,
                )]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title("Network")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        f.render_stateful_widget(list, chunks[0], &mut self.list_state);

        let details = Paragraph::new(self.network_lines()).block(
            Block::default()
                .title("Details")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(details, chunks[1]);
    }
}
