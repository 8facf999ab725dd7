//! dash-terminal - kitchen / admin / register terminal
//!
//! ```text
//! API_URL=http://localhost:8000 DASH_EMAIL=kitchen@dash.local DASH_PASSWORD=... dash-terminal
//! ```
//!
//! kitchen / admin: ↑↓ 选择订单，Enter 推进状态，q 退出。
//! admin: t 切换类型过滤，d 输入日期范围 (`2025-01-01..2025-01-31`)。
//! register: Tab 切换菜单 / 当前订单，Enter 加入，Backspace 移除，o 切换堂食 / 外送，Ctrl+S 提交。

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dash_client::{
    AdminFilter, ApiClient, Cart, ClientConfig, ConnectionState, FeedEvent, Order, OrderBoard,
    OrderFeed, OrderWrite, Propagation, Screen,
};
use ratatui::{prelude::*, widgets::*};
use shared::Dish;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

enum Notice {
    Info(String),
    Error(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane {
    Menu,
    Cart,
}

struct App {
    api: ApiClient,
    screen: Screen,
    board: OrderBoard,
    selected: usize,
    /// Admin filter
    filter: AdminFilter,
    /// Admin date input, while editing
    date_input: Option<String>,
    menu: Vec<Dish>,
    cart: Cart,
    pane: Pane,
    notice: Notice,
}

impl App {
    fn new(api: ApiClient, screen: Screen) -> Self {
        let hint = match screen {
            Screen::Register => "Enter adds a dish, Tab shows the order, Ctrl+S submits",
            Screen::Admin => "Enter advances, t filters by type, d filters by date, q quits",
            Screen::Kitchen => "Press Enter to advance the selected order, q to quit",
        };
        Self {
            api,
            screen,
            board: OrderBoard::new(),
            selected: 0,
            filter: AdminFilter::default(),
            date_input: None,
            menu: Vec::new(),
            cart: Cart::new(),
            pane: Pane::Menu,
            notice: Notice::Info(hint.to_string()),
        }
    }

    fn visible(&self) -> Vec<&Order> {
        self.board
            .orders()
            .iter()
            .filter(|o| self.screen.shows(o))
            .filter(|o| self.filter.matches(o))
            .collect()
    }

    fn list_len(&self) -> usize {
        match (self.screen, self.pane) {
            (Screen::Register, Pane::Menu) => self.menu.len(),
            (Screen::Register, Pane::Cart) => self.cart.len(),
            _ => self.visible().len(),
        }
    }

    fn clamp_selected(&mut self) {
        let len = self.list_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn handle_feed(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connecting => self.board.set_connection(ConnectionState::Connecting),
            FeedEvent::Connected => self.board.set_connection(ConnectionState::Connected),
            FeedEvent::Backfill(orders) => {
                let added = self.board.merge_listing(orders);
                self.notice = Notice::Info(format!("Backfilled {} order(s)", added));
            }
            FeedEvent::Order(order) => {
                self.board.apply(order);
            }
            FeedEvent::Disconnected(reason) => {
                self.board.set_error(reason.clone());
                self.board.set_connection(ConnectionState::Disconnected {
                    reason: Some(reason),
                });
            }
            FeedEvent::Rejected => {
                self.board.set_error("session rejected, restart to log in again");
                self.board
                    .set_connection(ConnectionState::Disconnected { reason: None });
            }
        }
        self.clamp_selected();
    }

    async fn advance_selected(&mut self) {
        let Some(order) = self.visible().get(self.selected).map(|o| (*o).clone()) else {
            return;
        };
        let Some(next) = order.status.next() else {
            self.notice = Notice::Info(format!("Order {} already delivered", short_id(&order.id)));
            return;
        };
        match self.api.update_status(&order.id, next).await {
            Ok(OrderWrite { order: updated, propagation }) => {
                self.notice = Notice::Info(format!(
                    "Order {} → {}{}",
                    short_id(&updated.id),
                    updated.status,
                    propagation_suffix(propagation)
                ));
                // 不等推送，本地先合并
                self.board.apply(updated);
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Status update failed");
                self.board.set_error(e.to_string());
            }
        }
        self.clamp_selected();
    }

    /// 按当前过滤条件向服务端查询，并合并进订单板
    async fn refresh_admin(&mut self) {
        let query = self.filter.query();
        match self.api.list_orders(&query).await {
            Ok(orders) => {
                let matched = orders.len();
                self.board.merge_listing(orders);
                self.notice = Notice::Info(format!(
                    "{} order(s) match {}",
                    matched,
                    self.filter.describe()
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Filtered listing failed");
                self.notice = Notice::Error(e.to_string());
            }
        }
        self.selected = 0;
    }

    async fn apply_date_input(&mut self, input: String) {
        match self.filter.set_dates(&input) {
            Ok(()) => self.refresh_admin().await,
            Err(e) => self.notice = Notice::Error(e.to_string()),
        }
    }

    fn add_selected_dish(&mut self) {
        if let Some(dish) = self.menu.get(self.selected) {
            self.cart.add(dish);
            self.notice = Notice::Info(format!(
                "Added {}, {} item(s), {:.2}",
                dish.title,
                self.cart.len(),
                self.cart.total()
            ));
        }
    }

    fn remove_selected_line(&mut self) {
        if self.cart.remove(self.selected).is_some() {
            self.clamp_selected();
        }
    }

    async fn submit_cart(&mut self) {
        if self.cart.is_empty() {
            self.notice = Notice::Error("Cannot submit an empty order".into());
            return;
        }
        match self
            .api
            .create_order(self.cart.items(), self.cart.order_type())
            .await
        {
            Ok(OrderWrite { order, propagation }) => {
                tracing::info!(order_id = %order.id, total = order.total_cost, "Order submitted");
                let text = format!(
                    "Order {} submitted, total {:.2}{}",
                    short_id(&order.id),
                    order.total_cost,
                    propagation_suffix(propagation)
                );
                self.notice = match propagation {
                    Propagation::Degraded => Notice::Error(text),
                    _ => Notice::Info(text),
                };
                self.cart.clear();
                self.selected = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Order submit failed");
                self.notice = Notice::Error(format!("Failed to submit order: {}", e));
            }
        }
    }

    fn switch_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Menu => Pane::Cart,
            Pane::Cart => Pane::Menu,
        };
        self.selected = 0;
    }

    /// Returns `false` when the terminal should exit
    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if let Some(input) = self.date_input.as_mut() {
            match key.code {
                KeyCode::Esc => self.date_input = None,
                KeyCode::Enter => {
                    let input = std::mem::take(input);
                    self.date_input = None;
                    self.apply_date_input(input).await;
                }
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.list_len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }

        match self.screen {
            Screen::Register => match key.code {
                KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.submit_cart().await
                }
                KeyCode::Tab => self.switch_pane(),
                KeyCode::Enter if self.pane == Pane::Menu => self.add_selected_dish(),
                KeyCode::Backspace | KeyCode::Delete if self.pane == Pane::Cart => {
                    self.remove_selected_line()
                }
                KeyCode::Char('o') => self.cart.toggle_order_type(),
                _ => {}
            },
            Screen::Admin => match key.code {
                KeyCode::Enter => self.advance_selected().await,
                KeyCode::Char('t') => {
                    self.filter.cycle_type();
                    self.refresh_admin().await;
                }
                KeyCode::Char('d') => self.date_input = Some(String::new()),
                _ => {}
            },
            Screen::Kitchen => {
                if key.code == KeyCode::Enter {
                    self.advance_selected().await;
                }
            }
        }
        true
    }
}

fn propagation_suffix(propagation: Propagation) -> &'static str {
    match propagation {
        Propagation::Degraded => " (saved, realtime update delayed)",
        Propagation::Published | Propagation::Unknown => "",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // TUI 占用终端，日志写文件
    let file_appender = tracing_appender::rolling::daily("logs", "dash-terminal");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    let config = ClientConfig::from_env();
    let (email, password) = config.credentials()?;

    let mut api = ApiClient::new(&config)?;
    let login = api.login(email, password).await?;
    tracing::info!(screen = config.screen.as_str(), role = %login.role, "Terminal starting");

    let shutdown = CancellationToken::new();
    let mut app = App::new(api.clone(), config.screen);

    let mut feed = if config.screen.uses_feed() {
        Some(OrderFeed::new(&config, api, shutdown.clone())?.spawn())
    } else {
        app.menu = app.api.load_menu().await?;
        tracing::info!(dishes = app.menu.len(), "Menu loaded");
        None
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let res = run_app(&mut terminal, &mut app, feed.as_mut()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    shutdown.cancel();
    if let Err(e) = app.api.logout().await {
        tracing::warn!(error = %e, "Logout failed");
    }

    res.map_err(Into::into)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    mut feed: Option<&mut mpsc::Receiver<FeedEvent>>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat)
                    && !app.handle_key(key).await
                {
                    return Ok(());
                }
            }
        }

        // Drain feed events (non-blocking)
        if let Some(feed) = feed.as_deref_mut() {
            while let Ok(event) = feed.try_recv() {
                app.handle_feed(event);
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Body
            Constraint::Length(3), // Status
        ])
        .split(f.area());

    f.render_widget(header(app), chunks[0]);

    match app.screen {
        Screen::Register => register_body(f, app, chunks[1]),
        Screen::Kitchen | Screen::Admin => board_body(f, app, chunks[1]),
    }

    let status = match (&app.date_input, app.board.last_error(), &app.notice) {
        (Some(input), _, _) => Line::from(vec![
            Span::styled("Dates (from..to): ", Style::default().fg(Color::Cyan)),
            Span::raw(input.as_str()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        (None, Some(err), _) => {
            Line::from(Span::styled(err.to_string(), Style::default().fg(Color::Red)))
        }
        (None, None, Notice::Error(text)) => {
            Line::from(Span::styled(text.as_str(), Style::default().fg(Color::Red)))
        }
        (None, None, Notice::Info(text)) => Line::from(text.as_str()),
    };
    f.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );
}

fn header(app: &App) -> Paragraph<'static> {
    let mut spans = vec![
        Span::raw(" DashDish "),
        Span::styled(
            format!(" {} ", app.screen.as_str()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | "),
    ];
    if app.screen == Screen::Register {
        spans.push(Span::raw(format!(
            "{} | {} item(s) | total {:.2}",
            app.cart.order_type().as_str(),
            app.cart.len(),
            app.cart.total()
        )));
    } else {
        let connection = app.board.connection();
        let connection_style = match connection {
            ConnectionState::Connected => {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            }
            ConnectionState::Connecting => Style::default().fg(Color::Yellow),
            ConnectionState::Disconnected { .. } => Style::default().fg(Color::Red),
        };
        spans.push(Span::styled(
            format!(" {} ", connection.as_str()),
            connection_style,
        ));
        spans.push(Span::raw(format!(
            " | filter: {} | {} order(s)",
            app.filter.describe(),
            app.visible().len()
        )));
    }
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
}

fn board_body(f: &mut Frame, app: &App, area: Rect) {
    let rows: Vec<ListItem> = app
        .visible()
        .iter()
        .map(|order| {
            let status_color = match order.status {
                shared::OrderStatus::Preparing => Color::Yellow,
                shared::OrderStatus::Done => Color::Green,
                shared::OrderStatus::Delivered => Color::DarkGray,
            };
            let items = order
                .items
                .iter()
                .map(|i| format!("{}×{}", i.quantity, i.id_dish))
                .collect::<Vec<_>>()
                .join(", ");
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} ", order.created_at.format("%m-%d %H:%M"))),
                Span::styled(
                    format!("{:<10}", order.status.as_str()),
                    Style::default().fg(status_color),
                ),
                Span::raw(format!(
                    "{:<9}{:>8.2}  {}  {}",
                    order.order_type.as_str(),
                    order.total_cost,
                    short_id(&order.id),
                    items
                )),
            ]))
        })
        .collect();

    render_list(f, area, " Orders ", rows, app.selected, true);
}

fn register_body(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let menu: Vec<ListItem> = if app.menu.is_empty() {
        vec![ListItem::new("Menu is empty")]
    } else {
        app.menu
            .iter()
            .map(|dish| ListItem::new(format!("{:<24}{:>8.2}", dish.title, dish.cost_unit)))
            .collect()
    };
    render_list(
        f,
        columns[0],
        " Menu ",
        menu,
        app.selected,
        app.pane == Pane::Menu && !app.menu.is_empty(),
    );

    let lines: Vec<ListItem> = app
        .cart
        .lines()
        .iter()
        .map(|dish| ListItem::new(format!("{:<24}{:>8.2}", dish.title, dish.cost_unit)))
        .collect();
    let title = format!(" Current order ({:.2}) ", app.cart.total());
    render_list(
        f,
        columns[1],
        &title,
        lines,
        app.selected,
        app.pane == Pane::Cart,
    );
}

fn render_list(
    f: &mut Frame,
    area: Rect,
    title: &str,
    rows: Vec<ListItem>,
    selected: usize,
    focused: bool,
) {
    let mut state = ListState::default();
    if focused && !rows.is_empty() {
        state.select(Some(selected));
    }
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let list = List::new(rows)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("► ");
    f.render_stateful_widget(list, area, &mut state);
}
