use std::{sync::Arc, time::Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};
use tracing::{debug, info, warn};

use crate::{
    action::Action,
    cli::Args,
    components::{Component, cold_staking::ColdStakingComponent, settings::SettingsComponent},
    config::Config,
    domain::{
        address_type::AddressType,
        amount::format_coins,
        delegation::DelegationRequest,
        fee_estimator::{EstimatorSettings, FeeEstimate, FeeEstimator},
        pipeline::{DelegationError, DelegationPipeline, PipelineSettings, PipelineState, Stage},
    },
    infra::{
        http::HttpNodeApi,
        node_api::{ApiError, NodeApi},
        store::Store,
    },
    tui::{Event, Frame, Tui},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Settings,
    ColdStaking,
}

impl Tab {
    pub fn all() -> [Tab; 2] {
        [Tab::Settings, Tab::ColdStaking]
    }

    pub fn title(&self) -> Line<'static> {
        match self {
            Tab::Settings => Line::from(vec![
                Span::styled("S", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw("ettings"),
            ]),
            Tab::ColdStaking => Line::from(vec![
                Span::styled("D", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw("elegate"),
            ]),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tab::Settings => 0,
            Tab::ColdStaking => 1,
        }
    }

    pub fn from_index(index: usize) -> Tab {
        match index {
            1 => Tab::ColdStaking,
            _ => Tab::Settings,
        }
    }
}

/// Node-facing services for the selected network.
struct Services {
    api: Arc<dyn NodeApi>,
    fee_estimator: FeeEstimator,
    pipeline: DelegationPipeline,
    estimate_rx: watch::Receiver<FeeEstimate>,
    fee_error_rx: watch::Receiver<Option<String>>,
    pipeline_rx: watch::Receiver<PipelineState>,
}

impl Services {
    fn connect(config: &Config) -> Result<Self> {
        let api: Arc<dyn NodeApi> = Arc::new(HttpNodeApi::from_config(config)?);
        let fee_estimator = FeeEstimator::new(api.clone(), EstimatorSettings::from_config(config));
        let pipeline = DelegationPipeline::new(api.clone(), PipelineSettings::from_config(config));
        Ok(Self {
            estimate_rx: fee_estimator.subscribe(),
            fee_error_rx: fee_estimator.errors(),
            pipeline_rx: pipeline.state(),
            api,
            fee_estimator,
            pipeline,
        })
    }
}

pub struct App {
    pub should_quit: bool,
    pub should_suspend: bool,
    pub config: Config,
    pub active_tab: Tab,
    pub action_tx: UnboundedSender<Action>,
    pub action_rx: UnboundedReceiver<Action>,
    pub tui: Tui,
    pub store: Store,
    services: Services,
    pub address_type: AddressType,
    pub settings_component: SettingsComponent,
    pub cold_staking_component: ColdStakingComponent,
    pub status_message: String,
    pub balance_refreshing: bool,
    pub last_balance_refresh: Option<Instant>,
}

impl App {
    pub fn new(args: &Args) -> Result<Self> {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let store = Store::new()?;

        // CLI wins, then the last network used, then mainnet
        let network = match &args.network {
            Some(network) => network.clone(),
            None => store.network()?.unwrap_or_else(|| "mainnet".to_string()),
        };
        let config = Config::new(&network, args.api_url.as_deref(), args.wallet.as_deref());
        let address_type = store.address_type()?;
        let services = Services::connect(&config)?;
        info!(
            "Using {} node at {} (wallet {})",
            config.network.name, config.network.api_url, config.wallet.name
        );

        let settings_component = SettingsComponent::new(action_tx.clone(), &config, address_type);
        let cold_staking_component =
            ColdStakingComponent::new(action_tx.clone(), &config.network.coin_unit);

        let tui = Tui::new()?
            .tick_rate(args.tick_rate)
            .frame_rate(args.frame_rate)
            .paste(true);

        Ok(Self {
            should_quit: false,
            should_suspend: false,
            config,
            active_tab: Tab::ColdStaking,
            action_tx,
            action_rx,
            tui,
            store,
            services,
            address_type,
            settings_component,
            cold_staking_component,
            status_message: "Ready".to_string(),
            balance_refreshing: false,
            last_balance_refresh: None,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.tui.enter()?;

        loop {
            // Handle events
            if let Some(event) = self.tui.next().await {
                self.handle_event(event)?;
            }

            // Handle actions
            while let Ok(action) = self.action_rx.try_recv() {
                self.handle_action(action)?;
            }

            if self.should_suspend {
                self.tui.suspend()?;
                self.should_suspend = false;
                self.tui.resume()?;
            }

            if self.should_quit {
                break;
            }
        }

        self.tui.exit()?;
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Tick => {
                self.action_tx.send(Action::Tick)?;
            }
            Event::Render => {
                self.action_tx.send(Action::Render)?;
            }
            Event::Key(key_event) => {
                self.handle_key_event(key_event)?;
            }
            Event::Resize(w, h) => {
                self.action_tx.send(Action::Resize(w, h))?;
            }
            Event::Init => {
                info!("Application initialized");
                self.action_tx.send(Action::RefreshBalance)?;
            }
            Event::Paste(text) => {
                if self.active_tab == Tab::ColdStaking {
                    self.cold_staking_component.paste(&text)?;
                }
            }
            Event::Error => {
                self.action_tx
                    .send(Action::Error("Terminal input error".to_string()))?;
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.action_tx.send(Action::Quit)?;
            return Ok(());
        }

        // Text fields swallow the global shortcuts
        if self.active_tab == Tab::ColdStaking && self.cold_staking_component.is_editing() {
            return self.cold_staking_component.handle_key_event(key);
        }

        match key.code {
            KeyCode::Char('q') if key.modifiers.is_empty() => {
                self.action_tx.send(Action::Quit)?;
            }
            KeyCode::Char('z') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.action_tx.send(Action::Suspend)?;
            }
            KeyCode::Char('r') if key.modifiers.is_empty() => {
                self.action_tx.send(Action::RefreshBalance)?;
            }
            KeyCode::Char('s') if key.modifiers.is_empty() => {
                self.action_tx.send(Action::TabSettings)?;
            }
            KeyCode::Char('d') if key.modifiers.is_empty() => {
                self.action_tx.send(Action::TabColdStaking)?;
            }
            KeyCode::Tab => {
                let next_index = (self.active_tab.index() + 1) % Tab::all().len();
                self.active_tab = Tab::from_index(next_index);
            }
            KeyCode::BackTab => {
                let count = Tab::all().len();
                let prev_index = (self.active_tab.index() + count - 1) % count;
                self.active_tab = Tab::from_index(prev_index);
            }
            _ => match self.active_tab {
                Tab::Settings => {
                    self.settings_component.handle_key_event(key)?;
                }
                Tab::ColdStaking => {
                    self.cold_staking_component.handle_key_event(key)?;
                }
            },
        }
        Ok(())
    }

    fn handle_action(&mut self, action: Action) -> Result<()> {
        if !matches!(action, Action::Tick | Action::Render) {
            debug!("Handling action: {:?}", action);
        }
        match action {
            Action::Tick => {
                let due = self
                    .last_balance_refresh
                    .is_none_or(|last| last.elapsed() >= self.config.fees.balance_refresh());
                if due {
                    self.refresh_balance();
                }
            }
            Action::Render => {
                self.draw_ui()?;
            }
            Action::Resize(w, h) => {
                self.tui.resize(Rect::new(0, 0, w, h))?;
                self.draw_ui()?;
            }
            Action::Quit => {
                self.should_quit = true;
            }
            Action::Suspend => {
                self.should_suspend = true;
            }
            Action::Error(message) => {
                warn!("{}", message);
                self.status_message = message;
            }
            Action::TabSettings => {
                self.active_tab = Tab::Settings;
            }
            Action::TabColdStaking => {
                self.active_tab = Tab::ColdStaking;
            }
            Action::SwitchNetwork(network) => {
                self.switch_network(&network)?;
            }
            Action::ToggleAddressType => {
                self.address_type = self.address_type.toggled();
                self.store.set_address_type(self.address_type)?;
                self.settings_component.address_type = self.address_type;
                self.status_message = format!("Address type: {}", self.address_type);
            }
            Action::FormChanged => {
                self.services
                    .fee_estimator
                    .on_form_changed(self.cold_staking_component.fields.clone());
            }
            Action::UseMaxBalance => {
                let max_amount = self.services.fee_estimator.max_amount();
                if max_amount == 0 {
                    self.status_message = "No spendable balance".to_string();
                } else {
                    self.cold_staking_component
                        .set_amount(format_coins(max_amount))?;
                }
            }
            Action::SendDelegation => {
                self.send_delegation();
            }
            Action::DelegationFinished => {
                let state = self.services.pipeline.current();
                match state.stage {
                    Stage::Succeeded => {
                        self.status_message = "Delegation sent".to_string();
                        self.cold_staking_component.clear();
                        self.refresh_balance();
                    }
                    _ => {
                        self.status_message = "Delegation failed".to_string();
                    }
                }
            }
            Action::RefreshBalance => {
                self.refresh_balance();
            }
            Action::BalanceUpdated { network, balance } => {
                if network == self.config.network.name {
                    self.balance_refreshing = false;
                    self.services.fee_estimator.apply_balance(balance);
                    self.cold_staking_component.balance_loaded = true;
                }
            }
            Action::BalanceUnavailable { network, message } => {
                if network == self.config.network.name {
                    self.balance_refreshing = false;
                    self.status_message = format!("Balance unavailable: {}", message);
                }
            }
        }
        Ok(())
    }

    /// Ask the node for the spendable balance; the answer comes back as an
    /// action tagged with the network it was asked on.
    fn refresh_balance(&mut self) {
        if self.balance_refreshing {
            return;
        }
        self.balance_refreshing = true;
        self.last_balance_refresh = Some(Instant::now());

        let api = self.services.api.clone();
        let action_tx = self.action_tx.clone();
        let network = self.config.network.name.clone();
        let wallet = self.config.wallet.name.clone();
        let account = self.config.wallet.account.clone();
        let fee_tier = self.cold_staking_component.fields.fee_tier;
        let timeout = self.config.fees.request_timeout();

        tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, api.max_balance(&wallet, &account, fee_tier))
                .await
                .unwrap_or(Err(ApiError::Timeout));
            let action = match result {
                Ok(balance) => Action::BalanceUpdated { network, balance },
                Err(e) => Action::BalanceUnavailable {
                    network,
                    message: e.user_message(),
                },
            };
            // The app may already be gone
            let _ = action_tx.send(action);
        });
    }

    fn send_delegation(&mut self) {
        let form = &mut self.cold_staking_component;
        form.dirty = true;

        let services = &self.services;
        let started = services
            .fee_estimator
            .settled_snapshot()
            .and_then(|estimate| {
                DelegationRequest::from_form(&form.fields, &estimate)
                    .map(|request| (request, estimate.fee))
            })
            .map_err(DelegationError::from)
            .and_then(|(request, fee)| services.pipeline.begin(request, fee));

        match started {
            Ok(run) => {
                let action_tx = self.action_tx.clone();
                tokio::spawn(async move {
                    run.run().await;
                    let _ = action_tx.send(Action::DelegationFinished);
                });
                form.error_message = None;
                self.status_message = "Sending delegation...".to_string();
            }
            Err(e) => {
                form.error_message = Some(e.to_string());
            }
        }
    }

    fn switch_network(&mut self, network: &str) -> Result<()> {
        if self.services.pipeline.is_sending() {
            self.status_message = "Wait for the delegation to finish first".to_string();
            return Ok(());
        }

        let mut config = Config::from_network(network);
        config.wallet = self.config.wallet.clone();
        config.fees = self.config.fees.clone();

        self.services = Services::connect(&config)?;
        self.store.set_network(&config.network.name)?;
        self.config = config;
        info!("Switched to {}", self.config.network.name);

        self.settings_component.set_config(&self.config);
        self.cold_staking_component =
            ColdStakingComponent::new(self.action_tx.clone(), &self.config.network.coin_unit);
        self.balance_refreshing = false;
        self.refresh_balance();
        self.status_message = format!("Switched to {}", self.config.network.name);
        Ok(())
    }

    /// Pull the latest estimator and pipeline state into the form.
    fn sync_views(&mut self) {
        let services = &mut self.services;
        let form = &mut self.cold_staking_component;

        if services.estimate_rx.has_changed().unwrap_or(false) {
            form.estimate = *services.estimate_rx.borrow_and_update();
        }
        if services.fee_error_rx.has_changed().unwrap_or(false) {
            form.fee_error = services.fee_error_rx.borrow_and_update().clone();
        }
        if services.pipeline_rx.has_changed().unwrap_or(false) {
            let state = services.pipeline_rx.borrow_and_update().clone();
            form.set_pipeline_state(state);
        }
    }

    fn draw_ui(&mut self) -> Result<()> {
        self.sync_views();

        let network = self.config.network.name.clone();
        let wallet = self.config.wallet.name.clone();
        let active_tab = self.active_tab;
        let status_message = self.status_message.clone();
        let settings = &mut self.settings_component;
        let cold_staking = &mut self.cold_staking_component;

        self.tui.draw(|f| {
            let chunks = Layout::vertical([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Status
            ])
            .split(f.area());

            draw_header(f, chunks[0], &network, &wallet);
            draw_tabs(f, chunks[1], active_tab);
            match active_tab {
                Tab::Settings => settings.draw(f, chunks[2]),
                Tab::ColdStaking => cold_staking.draw(f, chunks[2]),
            }
            draw_status(f, chunks[3], &status_message);
        })?;
        Ok(())
    }
}

fn draw_header(f: &mut Frame, area: Rect, network: &str, wallet: &str) {
    let title = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            "xCore Wallet",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("[{}]", network), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("wallet: {}", wallet), Style::default().fg(Color::Gray)),
    ])])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(title, area);
}

fn draw_tabs(f: &mut Frame, area: Rect, active_tab: Tab) {
    let titles: Vec<Line> = Tab::all().iter().map(|t| t.title()).collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL))
        .select(active_tab.index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn draw_status(f: &mut Frame, area: Rect, status_message: &str) {
    let status = Paragraph::new(vec![Line::from(vec![
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status_message, Style::default().fg(Color::Green)),
        Span::raw("  |  "),
        Span::styled(
            "[r]Refresh [q]Quit [Tab]Switch",
            Style::default().fg(Color::DarkGray),
        ),
    ])])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(status, area);
}
