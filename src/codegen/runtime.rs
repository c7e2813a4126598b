//! Process Registry Runtime
//!
//! Go source embedded into generated programs that declare watch commands.
//! The runtime keeps a `registry.json` under the state directory (`.devcmd`
//! in the working directory), one log file per process, and offers start /
//! stop / status / logs operations. Every mutation rewrites the registry file
//! atomically (write to a temp file, then rename); a missing file is an empty
//! registry, malformed content is treated as empty and logged.

use crate::decorators::ImportRequirements;

/// Imports the embedded runtime requires.
pub fn runtime_imports() -> ImportRequirements {
    ImportRequirements::stdlib([
        "encoding/json",
        "fmt",
        "io",
        "os",
        "os/exec",
        "path/filepath",
        "syscall",
        "time",
    ])
}

/// The supervision subsystem, verbatim Go source.
pub const PROCESS_REGISTRY_GO: &str = r#"type processEntry struct {
	Pid       int    `json:"pid"`
	Command   string `json:"command"`
	StartTime string `json:"start_time"`
	LogFile   string `json:"log_file"`
	Status    string `json:"status"`
}

const stateDirName = ".devcmd"

func registryPath() string {
	return filepath.Join(stateDirName, "registry.json")
}

func loadRegistry() map[string]processEntry {
	entries := map[string]processEntry{}
	data, err := os.ReadFile(registryPath())
	if err != nil {
		return entries
	}
	if err := json.Unmarshal(data, &entries); err != nil {
		fmt.Fprintf(os.Stderr, "warning: malformed registry, treating as empty: %v\n", err)
		return map[string]processEntry{}
	}
	return entries
}

func saveRegistry(entries map[string]processEntry) error {
	if err := os.MkdirAll(stateDirName, 0o755); err != nil {
		return err
	}
	data, err := json.MarshalIndent(entries, "", "  ")
	if err != nil {
		return err
	}
	tmp := registryPath() + ".tmp"
	if err := os.WriteFile(tmp, data, 0o644); err != nil {
		return err
	}
	return os.Rename(tmp, registryPath())
}

func processAlive(pid int) bool {
	return syscall.Kill(pid, 0) == nil
}

func registryStart(name, command string) error {
	entries := loadRegistry()
	if entry, ok := entries[name]; ok && processAlive(entry.Pid) {
		return fmt.Errorf("%s is already running (pid %d)", name, entry.Pid)
	}
	if err := os.MkdirAll(stateDirName, 0o755); err != nil {
		return err
	}
	logPath := filepath.Join(stateDirName, name+".log")
	logFile, err := os.OpenFile(logPath, os.O_CREATE|os.O_WRONLY|os.O_APPEND, 0o644)
	if err != nil {
		return err
	}
	defer logFile.Close()

	cmd := exec.Command("sh", "-c", command)
	cmd.Stdout = logFile
	cmd.Stderr = logFile
	cmd.SysProcAttr = &syscall.SysProcAttr{Setsid: true}
	if err := cmd.Start(); err != nil {
		return err
	}
	entries[name] = processEntry{
		Pid:       cmd.Process.Pid,
		Command:   command,
		StartTime: time.Now().Format(time.RFC3339),
		LogFile:   logPath,
		Status:    "running",
	}
	if err := saveRegistry(entries); err != nil {
		return err
	}
	fmt.Printf("started %s (pid %d), logs: %s\n", name, cmd.Process.Pid, logPath)
	return cmd.Process.Release()
}

func registryStop(name string) error {
	entries := loadRegistry()
	entry, ok := entries[name]
	if !ok {
		return fmt.Errorf("no such process: %s", name)
	}
	if processAlive(entry.Pid) {
		if err := syscall.Kill(entry.Pid, syscall.SIGTERM); err != nil {
			return err
		}
		deadline := time.Now().Add(5 * time.Second)
		for processAlive(entry.Pid) && time.Now().Before(deadline) {
			time.Sleep(100 * time.Millisecond)
		}
		if processAlive(entry.Pid) {
			_ = syscall.Kill(entry.Pid, syscall.SIGKILL)
		}
	}
	delete(entries, name)
	if err := saveRegistry(entries); err != nil {
		return err
	}
	fmt.Printf("stopped %s\n", name)
	return nil
}

func registryStatus() error {
	entries := loadRegistry()
	changed := false
	for name, entry := range entries {
		if entry.Status == "running" && !processAlive(entry.Pid) {
			entry.Status = "dead"
			entries[name] = entry
			changed = true
		}
	}
	if changed {
		if err := saveRegistry(entries); err != nil {
			return err
		}
	}
	if len(entries) == 0 {
		fmt.Println("no managed processes")
		return nil
	}
	for name, entry := range entries {
		fmt.Printf("%-16s %-8s pid=%-8d since %s\n", name, entry.Status, entry.Pid, entry.StartTime)
	}
	return nil
}

func registryLogs(name string) error {
	entries := loadRegistry()
	entry, ok := entries[name]
	if !ok {
		return fmt.Errorf("no such process: %s", name)
	}
	f, err := os.Open(entry.LogFile)
	if err != nil {
		return err
	}
	defer f.Close()
	_, err = io.Copy(os.Stdout, f)
	return err
}
"#;

// ============================================================================
// Tests
// ============================================================================
